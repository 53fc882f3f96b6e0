use model::{
    BoardReplica, BoardSize, PaletteIndex, PixelDelta, Rect, RowRange, SharedBoard, pack_rgba,
};

use crate::{
    BOARD_LAYER, BoardDraw, BoardLayer, CLEAR_COLOR, FrameContext, Layer, LayerOptions,
    LayerStack, RETICLE_LAYER, RenderError, RenderTarget, ReticleDraw, ReticleLayer, TextureId,
    reticle_geometry,
};

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Begin([u8; 3]),
    Create(TextureId, BoardSize),
    Upload(TextureId, RowRange, usize),
    Destroy(TextureId),
    Board(BoardDraw),
    Reticle(ReticleDraw),
    End,
}

#[derive(Default)]
struct RecordingTarget {
    calls: Vec<Call>,
    next_texture: u64,
}

impl RecordingTarget {
    fn take(&mut self) -> Vec<Call> {
        std::mem::take(&mut self.calls)
    }
}

impl RenderTarget for RecordingTarget {
    fn begin_frame(&mut self, clear: [u8; 3]) -> Result<(), RenderError> {
        self.calls.push(Call::Begin(clear));
        Ok(())
    }

    fn create_texture(&mut self, size: BoardSize) -> TextureId {
        self.next_texture += 1;
        let id = TextureId(self.next_texture);
        self.calls.push(Call::Create(id, size));
        id
    }

    fn upload_rows(&mut self, texture: TextureId, rows: RowRange, pixels: &[u32]) {
        self.calls.push(Call::Upload(texture, rows, pixels.len()));
    }

    fn destroy_texture(&mut self, texture: TextureId) {
        self.calls.push(Call::Destroy(texture));
    }

    fn draw_board(&mut self, draw: &BoardDraw) {
        self.calls.push(Call::Board(*draw));
    }

    fn draw_reticle(&mut self, draw: &ReticleDraw) {
        self.calls.push(Call::Reticle(*draw));
    }

    fn end_frame(&mut self) {
        self.calls.push(Call::End);
    }
}

/// Reports its name length through the draw opacity so tests can see the order.
struct MarkerLayer(&'static str);

impl Layer for MarkerLayer {
    fn draw(&mut self, target: &mut dyn RenderTarget, _frame: &FrameContext<'_>, _opacity: f32) {
        target.draw_reticle(&ReticleDraw {
            clip_matrix: [0.0; 16],
            rect: Rect::default(),
            color: [0.0; 4],
            border_cutoff: 0.0,
            opacity: marker_id(self.0),
        });
    }

    fn destroy(&mut self, _target: &mut dyn RenderTarget) {}
}

fn marker_id(name: &str) -> f32 {
    name.len() as f32
}

fn palette() -> PaletteIndex {
    PaletteIndex::from_hex_entries([("black", "000000"), ("red", "ff0000")]).expect("palette")
}

fn install(board: &SharedBoard, width: u32, height: u32) {
    let size = BoardSize::new(width, height);
    let replica = BoardReplica::from_snapshot(size, &vec![0; size.pixel_count()], &palette(), &[])
        .expect("snapshot");
    board.install(replica);
}

fn frame(board: &SharedBoard) -> FrameContext<'_> {
    FrameContext {
        board,
        clip_matrix: Some([1.0; 16]),
        scale: 4.0,
        hover: None,
        selected_color: None,
        hover_capable: true,
    }
}

fn uploads(calls: &[Call]) -> Vec<RowRange> {
    calls
        .iter()
        .filter_map(|call| match call {
            Call::Upload(_, rows, _) => Some(*rows),
            _ => None,
        })
        .collect()
}

fn board_stack() -> LayerStack {
    let mut stack = LayerStack::new();
    stack
        .register(LayerOptions::new(BOARD_LAYER), Box::new(BoardLayer::new()))
        .expect("board layer");
    stack
}

#[test]
fn frame_clears_then_draws_visible_layers_in_order() {
    let board = SharedBoard::new();
    let mut target = RecordingTarget::default();
    let mut stack = LayerStack::new();
    for name in ["a", "bb", "ccc", "dddd"] {
        stack
            .register(LayerOptions::new(name), Box::new(MarkerLayer(name)))
            .expect("register");
    }
    assert!(stack.set_enabled("bb", false));
    assert!(stack.set_opacity("dddd", 0.0));

    stack.render(&mut target, &frame(&board)).expect("render");

    let calls = target.take();
    assert_eq!(calls.first(), Some(&Call::Begin(CLEAR_COLOR)));
    assert_eq!(calls.last(), Some(&Call::End));
    let drawn: Vec<f32> = calls
        .iter()
        .filter_map(|call| match call {
            Call::Reticle(draw) => Some(draw.opacity),
            _ => None,
        })
        .collect();
    assert_eq!(drawn, vec![marker_id("a"), marker_id("ccc")]);
}

#[test]
fn duplicate_layer_names_are_rejected() {
    let mut stack = LayerStack::new();
    stack
        .register(LayerOptions::new("grid"), Box::new(MarkerLayer("grid")))
        .expect("first");
    let error = stack
        .register(LayerOptions::new("grid"), Box::new(MarkerLayer("grid")))
        .expect_err("duplicate");
    assert!(matches!(error, RenderError::DuplicateLayer(name) if name == "grid"));
    assert_eq!(stack.options().len(), 1);
}

#[test]
fn saved_options_survive_until_layer_registers() {
    let mut stack = LayerStack::new();
    stack
        .register(LayerOptions::new(BOARD_LAYER), Box::new(MarkerLayer("b")))
        .expect("board");
    stack.merge_options(&[
        LayerOptions {
            name: RETICLE_LAYER.to_string(),
            enabled: false,
            opacity: 0.5,
        },
        LayerOptions {
            name: BOARD_LAYER.to_string(),
            enabled: true,
            opacity: 3.0,
        },
    ]);

    assert_eq!(
        stack.layer_options(BOARD_LAYER).map(|options| options.opacity),
        Some(1.0)
    );
    stack
        .register(LayerOptions::new(RETICLE_LAYER), Box::new(ReticleLayer::new()))
        .expect("reticle attaches to saved options");
    let reticle = stack.layer_options(RETICLE_LAYER).expect("reticle options");
    assert!(!reticle.enabled);
    assert_eq!(reticle.opacity, 0.5);

    let names: Vec<String> = stack.options().into_iter().map(|options| options.name).collect();
    assert_eq!(names, vec![BOARD_LAYER.to_string(), RETICLE_LAYER.to_string()]);
}

#[test]
fn board_layer_uploads_full_then_only_dirty_rows() {
    let board = SharedBoard::new();
    install(&board, 4, 8);
    let mut target = RecordingTarget::default();
    let mut stack = board_stack();

    stack.render(&mut target, &frame(&board)).expect("render");
    let calls = target.take();
    assert_eq!(calls[1], Call::Create(TextureId(1), BoardSize::new(4, 8)));
    assert_eq!(calls[2], Call::Upload(TextureId(1), RowRange::new(0, 8), 32));
    assert!(matches!(
        calls[3],
        Call::Board(draw) if draw.texture == TextureId(1) && draw.opacity == 1.0
    ));

    stack.render(&mut target, &frame(&board)).expect("render");
    assert!(uploads(&target.take()).is_empty());

    let deltas = [
        PixelDelta::new(0, 2, 1),
        PixelDelta::new(3, 3, 1),
        PixelDelta::new(1, 6, 1),
    ];
    board.apply_deltas(&deltas, &palette(), |_, _| {});
    stack.render(&mut target, &frame(&board)).expect("render");
    let calls = target.take();
    assert_eq!(
        uploads(&calls),
        vec![RowRange::new(2, 2), RowRange::new(6, 1)]
    );
    assert!(calls.contains(&Call::Upload(TextureId(1), RowRange::new(2, 2), 8)));
}

#[test]
fn board_uploads_but_skips_drawing_without_a_transform() {
    let board = SharedBoard::new();
    install(&board, 3, 3);
    let mut target = RecordingTarget::default();
    let mut stack = board_stack();

    let context = FrameContext {
        clip_matrix: None,
        ..frame(&board)
    };
    stack.render(&mut target, &context).expect("render");
    let calls = target.take();
    assert_eq!(uploads(&calls), vec![RowRange::new(0, 3)]);
    assert!(!calls.iter().any(|call| matches!(call, Call::Board(_))));
    assert_eq!(calls.last(), Some(&Call::End));
}

#[test]
fn new_surface_replaces_texture_and_reset_releases_it() {
    let board = SharedBoard::new();
    install(&board, 2, 2);
    let mut target = RecordingTarget::default();
    let mut stack = board_stack();
    stack.render(&mut target, &frame(&board)).expect("render");
    target.take();

    install(&board, 3, 1);
    stack.render(&mut target, &frame(&board)).expect("render");
    let calls = target.take();
    assert_eq!(
        &calls[1..4],
        &[
            Call::Destroy(TextureId(1)),
            Call::Create(TextureId(2), BoardSize::new(3, 1)),
            Call::Upload(TextureId(2), RowRange::new(0, 1), 3),
        ]
    );

    board.reset();
    stack.render(&mut target, &frame(&board)).expect("render");
    assert_eq!(
        target.take(),
        vec![Call::Begin(CLEAR_COLOR), Call::Destroy(TextureId(2)), Call::End]
    );
}

#[test]
fn unregister_releases_board_texture() {
    let board = SharedBoard::new();
    install(&board, 2, 2);
    let mut target = RecordingTarget::default();
    let mut stack = board_stack();
    stack.render(&mut target, &frame(&board)).expect("render");
    target.take();

    assert!(stack.unregister(BOARD_LAYER, &mut target));
    assert_eq!(target.take(), vec![Call::Destroy(TextureId(1))]);
    assert!(!stack.unregister(BOARD_LAYER, &mut target));
    assert!(stack.options().is_empty());
}

#[test]
fn reticle_needs_hover_selection_and_hover_capability() {
    let board = SharedBoard::new();
    let mut target = RecordingTarget::default();
    let mut layer = ReticleLayer::new();
    let red = pack_rgba(255, 0, 0, 255);

    let cases = [
        (None, Some(red), true),
        (Some((3, 4)), None, true),
        (Some((3, 4)), Some(red), false),
    ];
    for (hover, selected_color, hover_capable) in cases {
        let context = FrameContext {
            hover,
            selected_color,
            hover_capable,
            ..frame(&board)
        };
        layer.draw(&mut target, &context, 1.0);
    }
    assert!(target.take().is_empty());

    let context = FrameContext {
        hover: Some((3, 4)),
        selected_color: Some(red),
        ..frame(&board)
    };
    layer.draw(&mut target, &context, 0.75);
    let calls = target.take();
    let Call::Reticle(draw) = &calls[0] else {
        panic!("expected reticle draw, got {calls:?}");
    };
    assert_eq!(draw.rect, Rect::new(2.5, 3.5, 2.0, 2.0));
    assert_eq!(draw.color, [1.0, 0.0, 0.0, 1.0]);
    assert_eq!(draw.opacity, 0.75);
}

#[test]
fn reticle_border_stays_two_device_pixels() {
    let geometry = reticle_geometry(10, 20, 10.0);
    let expected = Rect::new(9.8, 19.8, 1.4, 1.4);
    assert!((geometry.rect.x - expected.x).abs() < 1e-5);
    assert!((geometry.rect.y - expected.y).abs() < 1e-5);
    assert!((geometry.rect.width - expected.width).abs() < 1e-5);
    assert!((geometry.rect.height - expected.height).abs() < 1e-5);
    assert!((geometry.border_cutoff - (1.0 - 2.0 / 14.0)).abs() < 1e-6);

    let quad_px = geometry.rect.width * 10.0;
    let border_px = (1.0 - geometry.border_cutoff) * quad_px;
    assert!((border_px - 2.0).abs() < 1e-4);
}
