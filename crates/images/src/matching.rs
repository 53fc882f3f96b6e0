use image::Rgba;
use model::{PaletteIndex, unpack_rgba};

use crate::ImageData;
use crate::color::{Lab, ciede2000, srgb_to_lab};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MatchError {
    #[error("pixel ({x}, {y}) has alpha {alpha}, expected 0 or 255")]
    PartialAlpha { x: u32, y: u32, alpha: u8 },
    #[error("palette is empty")]
    EmptyPalette,
    #[error("target width {target_width} does not evenly divide image {width}x{height}")]
    UnevenCells {
        width: u32,
        height: u32,
        target_width: u32,
    },
    #[error("cell at ({x}, {y}) holds more than one opaque color")]
    MixedCell { x: u32, y: u32 },
}

/// Maps an image onto a palette. Transparent pixels stay as they are.
pub trait PaletteMatcher {
    fn match_palette(&self, image: &ImageData, palette: &PaletteIndex)
    -> Result<ImageData, MatchError>;
}

/// Picks the palette entry with the smallest CIEDE2000 distance.
#[derive(Debug, Clone, Copy, Default)]
pub struct CiedeMatcher;

impl PaletteMatcher for CiedeMatcher {
    fn match_palette(
        &self,
        image: &ImageData,
        palette: &PaletteIndex,
    ) -> Result<ImageData, MatchError> {
        ensure_binary_alpha(image)?;
        if palette.is_empty() {
            return Err(MatchError::EmptyPalette);
        }

        let targets: Vec<(Lab, [u8; 4])> = palette
            .entries()
            .iter()
            .map(|entry| {
                let rgba = unpack_rgba(entry.packed_color);
                (srgb_to_lab(rgba[0], rgba[1], rgba[2]), rgba)
            })
            .collect();

        let mut output = image.clone();
        for pixel in output.pixels_mut() {
            let Rgba([r, g, b, a]) = *pixel;
            if a == 0 {
                continue;
            }
            let lab = srgb_to_lab(r, g, b);
            let mut best = targets[0].1;
            let mut best_distance = f64::INFINITY;
            for (target, rgba) in &targets {
                let distance = ciede2000(lab, *target);
                if distance < best_distance {
                    best_distance = distance;
                    best = *rgba;
                }
            }
            *pixel = Rgba(best);
        }
        Ok(output)
    }
}

fn ensure_binary_alpha(image: &ImageData) -> Result<(), MatchError> {
    match image
        .enumerate_pixels()
        .find(|(_, _, pixel)| !matches!(pixel.0[3], 0 | 255))
    {
        Some((x, y, pixel)) => Err(MatchError::PartialAlpha {
            x,
            y,
            alpha: pixel.0[3],
        }),
        None => Ok(()),
    }
}

/// Darkens pixels already on the palette and paints the rest opaque red.
pub fn highlight_incorrect_colors(
    image: &ImageData,
    palette: &PaletteIndex,
) -> Result<ImageData, MatchError> {
    ensure_binary_alpha(image)?;
    let mut output = image.clone();
    for pixel in output.pixels_mut() {
        let Rgba([r, g, b, a]) = *pixel;
        if a == 0 {
            continue;
        }
        let on_palette = palette
            .entries()
            .iter()
            .any(|entry| unpack_rgba(entry.packed_color) == pixel.0);
        *pixel = if on_palette {
            Rgba([r / 4, g / 4, b / 4, a])
        } else {
            Rgba([255, 0, 0, 255])
        };
    }
    Ok(output)
}

/// Collapses a template drawn with square cells into one pixel per cell.
///
/// Every opaque pixel inside a cell must share one color; an all-transparent
/// cell becomes transparent.
pub fn detemplatize(image: &ImageData, target_width: u32) -> Result<ImageData, MatchError> {
    let (width, height) = image.dimensions();
    let uneven = || MatchError::UnevenCells {
        width,
        height,
        target_width,
    };
    if target_width == 0 || width == 0 || width % target_width != 0 {
        return Err(uneven());
    }
    let cell = width / target_width;
    if cell == 0 || height % cell != 0 {
        return Err(uneven());
    }
    let target_height = height / cell;

    let mut output = ImageData::new(target_width, target_height);
    for cy in 0..target_height {
        for cx in 0..target_width {
            let mut color: Option<Rgba<u8>> = None;
            for y in cy * cell..(cy + 1) * cell {
                for x in cx * cell..(cx + 1) * cell {
                    let pixel = *image.get_pixel(x, y);
                    match pixel.0[3] {
                        0 => continue,
                        255 => {}
                        alpha => return Err(MatchError::PartialAlpha { x, y, alpha }),
                    }
                    match color {
                        Some(existing) if existing != pixel => {
                            return Err(MatchError::MixedCell { x: cx, y: cy });
                        }
                        _ => color = Some(pixel),
                    }
                }
            }
            if let Some(color) = color {
                output.put_pixel(cx, cy, color);
            }
        }
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn palette() -> PaletteIndex {
        PaletteIndex::from_hex_entries([("White", "ffffff"), ("Red", "ff0000"), ("Blue", "0000ff")])
            .expect("palette")
    }

    #[test]
    fn matches_to_nearest_and_keeps_transparency() {
        let mut image = ImageData::new(3, 1);
        image.put_pixel(0, 0, Rgba([250, 240, 245, 255]));
        image.put_pixel(1, 0, Rgba([200, 10, 30, 255]));
        image.put_pixel(2, 0, Rgba([9, 9, 9, 0]));

        let matched = CiedeMatcher
            .match_palette(&image, &palette())
            .expect("match");
        assert_eq!(matched.dimensions(), (3, 1));
        assert_eq!(matched.get_pixel(0, 0), &Rgba([255, 255, 255, 255]));
        assert_eq!(matched.get_pixel(1, 0), &Rgba([255, 0, 0, 255]));
        assert_eq!(matched.get_pixel(2, 0), &Rgba([9, 9, 9, 0]));
    }

    #[test]
    fn partial_alpha_fails_without_touching_input() {
        let mut image = ImageData::new(2, 2);
        image.put_pixel(1, 1, Rgba([1, 2, 3, 128]));
        let before = image.clone();

        let error = CiedeMatcher
            .match_palette(&image, &palette())
            .expect_err("partial alpha");
        assert_eq!(error, MatchError::PartialAlpha { x: 1, y: 1, alpha: 128 });
        assert_eq!(image, before);
    }

    #[test]
    fn highlight_marks_off_palette_pixels() {
        let mut image = ImageData::new(2, 1);
        image.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
        image.put_pixel(1, 0, Rgba([1, 2, 3, 255]));
        let output = highlight_incorrect_colors(&image, &palette()).expect("highlight");
        assert_eq!(output.get_pixel(0, 0), &Rgba([63, 0, 0, 255]));
        assert_eq!(output.get_pixel(1, 0), &Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn detemplatize_collapses_cells() {
        let red = Rgba([255, 0, 0, 255]);
        let mut image = ImageData::new(4, 2);
        image.put_pixel(0, 0, red);
        image.put_pixel(1, 1, red);

        let output = detemplatize(&image, 2).expect("detemplatize");
        assert_eq!(output.dimensions(), (2, 1));
        assert_eq!(output.get_pixel(0, 0), &red);
        assert_eq!(output.get_pixel(1, 0).0[3], 0);
    }

    #[test]
    fn detemplatize_rejects_bad_geometry_and_mixed_cells() {
        let image = ImageData::new(5, 4);
        assert!(matches!(
            detemplatize(&image, 2),
            Err(MatchError::UnevenCells { .. })
        ));
        assert!(matches!(
            detemplatize(&image, 0),
            Err(MatchError::UnevenCells { .. })
        ));
        assert!(matches!(
            detemplatize(&ImageData::new(0, 0), 1),
            Err(MatchError::UnevenCells { .. })
        ));
        assert!(matches!(
            detemplatize(&ImageData::new(0, 3), 2),
            Err(MatchError::UnevenCells { .. })
        ));

        let mut image = ImageData::new(2, 2);
        image.put_pixel(0, 0, Rgba([1, 1, 1, 255]));
        image.put_pixel(1, 1, Rgba([2, 2, 2, 255]));
        assert_eq!(
            detemplatize(&image, 1),
            Err(MatchError::MixedCell { x: 0, y: 0 })
        );
    }
}
