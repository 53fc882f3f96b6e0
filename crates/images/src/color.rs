use std::f64::consts::PI;

const EPSILON: f64 = 0.008856451679035631;
const KAPPA: f64 = 903.2962962962963;
const G_FACTOR: f64 = 6_103_515_625.0; // 25^7

/// CIE L*a*b* under D65.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lab {
    pub l: f64,
    pub a: f64,
    pub b: f64,
}

fn linearize(channel: u8) -> f64 {
    let c = channel as f64 / 255.0;
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

fn lab_f(t: f64) -> f64 {
    if t > EPSILON {
        t.cbrt()
    } else {
        (KAPPA * t + 16.0) / 116.0
    }
}

pub fn srgb_to_lab(r: u8, g: u8, b: u8) -> Lab {
    let (lr, lg, lb) = (linearize(r), linearize(g), linearize(b));

    let x = lr * 0.41239079926595934 + lg * 0.357584339383878 + lb * 0.1804807884018343;
    let y = lr * 0.21263900587151027 + lg * 0.715168678767756 + lb * 0.07219231536073371;
    let z = lr * 0.01933081871559182 + lg * 0.11919477979462598 + lb * 0.9505321522496607;

    let fx = lab_f(x / 0.9504559270516716);
    let fy = lab_f(y);
    let fz = lab_f(z / 1.0890577507598784);

    Lab {
        l: 116.0 * fy - 16.0,
        a: 500.0 * (fx - fy),
        b: 200.0 * (fy - fz),
    }
}

/// CIEDE2000 color difference with unit weighting factors.
pub fn ciede2000(first: Lab, second: Lab) -> f64 {
    let to_deg = 180.0 / PI;
    let to_rad = PI / 180.0;

    let c1 = first.a.hypot(first.b);
    let c2 = second.a.hypot(second.b);
    let c7 = ((c1 + c2) / 2.0).powi(7);
    let g = 0.5 * (1.0 - (c7 / (c7 + G_FACTOR)).sqrt());

    let a1 = (1.0 + g) * first.a;
    let a2 = (1.0 + g) * second.a;
    let cd1 = a1.hypot(first.b);
    let cd2 = a2.hypot(second.b);

    let hue = |a: f64, b: f64| {
        if a == 0.0 && b == 0.0 {
            return 0.0;
        }
        let h = b.atan2(a);
        (if h < 0.0 { h + 2.0 * PI } else { h }) * to_deg
    };
    let h1 = hue(a1, first.b);
    let h2 = hue(a2, second.b);

    let dl = second.l - first.l;
    let dc = cd2 - cd1;
    let hdiff = h2 - h1;
    let hsum = h1 + h2;
    let chroma_product = cd1 * cd2;

    let dh = if chroma_product == 0.0 {
        0.0
    } else if hdiff.abs() <= 180.0 {
        hdiff
    } else if hdiff > 180.0 {
        hdiff - 360.0
    } else {
        hdiff + 360.0
    };
    let d_big_h = 2.0 * chroma_product.sqrt() * (dh * to_rad / 2.0).sin();

    let l_mean = (first.l + second.l) / 2.0;
    let c_mean = (cd1 + cd2) / 2.0;
    let c_mean7 = c_mean.powi(7);

    let h_mean = if chroma_product == 0.0 {
        hsum
    } else if hdiff.abs() <= 180.0 {
        hsum / 2.0
    } else if hsum < 360.0 {
        (hsum + 360.0) / 2.0
    } else {
        (hsum - 360.0) / 2.0
    };

    let lsq = (l_mean - 50.0).powi(2);
    let sl = 1.0 + 0.015 * lsq / (20.0 + lsq).sqrt();
    let sc = 1.0 + 0.045 * c_mean;
    let t = 1.0 - 0.17 * ((h_mean - 30.0) * to_rad).cos()
        + 0.24 * (2.0 * h_mean * to_rad).cos()
        + 0.32 * ((3.0 * h_mean + 6.0) * to_rad).cos()
        - 0.2 * ((4.0 * h_mean - 63.0) * to_rad).cos();
    let sh = 1.0 + 0.015 * c_mean * t;

    let d_theta = 30.0 * (-((h_mean - 275.0) / 25.0).powi(2)).exp();
    let rc = 2.0 * (c_mean7 / (c_mean7 + G_FACTOR)).sqrt();
    let rt = -(2.0 * d_theta * to_rad).sin() * rc;

    let l_term = dl / sl;
    let c_term = dc / sc;
    let h_term = d_big_h / sh;
    (l_term * l_term + c_term * c_term + h_term * h_term + rt * c_term * h_term).sqrt()
}
