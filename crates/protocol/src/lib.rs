//! Wire shapes for the canvas HTTP API and the push channel.
//!
//! Only the pieces the sync core interprets are typed. Everything else on the
//! push channel is kept as raw JSON and forwarded untouched.

use model::{BoardInfo, BoardSize, PaletteError, PaletteIndex, PixelDelta};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("message has no string `type` field")]
    MissingType,
    #[error("invalid canvas dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
    #[error(transparent)]
    Palette(#[from] PaletteError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPaletteItem {
    pub name: String,
    /// Six hex digits without a leading `#`.
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityCooldown {
    pub steepness: f64,
    pub multiplier: f64,
    pub global_offset: f64,
    pub user_offset: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CooldownInfo {
    #[serde(rename = "type")]
    pub kind: String,
    pub static_cooldown_seconds: u32,
    pub activity_cooldown: ActivityCooldown,
}

/// Body of `GET /info`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfoResponse {
    pub canvas_code: String,
    pub width: u32,
    pub height: u32,
    pub palette: Vec<RawPaletteItem>,
    #[serde(default)]
    pub cooldown_info: Option<CooldownInfo>,
    /// Fields owned by other collaborators (chat, heatmap, auth, ...).
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl InfoResponse {
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

impl TryFrom<&InfoResponse> for BoardInfo {
    type Error = ProtocolError;

    fn try_from(response: &InfoResponse) -> Result<Self, Self::Error> {
        if response.width == 0 || response.height == 0 {
            return Err(ProtocolError::InvalidDimensions {
                width: response.width,
                height: response.height,
            });
        }
        let palette = PaletteIndex::from_hex_entries(
            response
                .palette
                .iter()
                .map(|item| (item.name.as_str(), item.value.as_str())),
        )?;
        Ok(BoardInfo {
            canvas_code: response.canvas_code.clone(),
            size: BoardSize::new(response.width, response.height),
            palette,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WirePixel {
    pub x: i32,
    pub y: i32,
    pub color: u32,
}

impl From<WirePixel> for PixelDelta {
    fn from(pixel: WirePixel) -> Self {
        PixelDelta::new(pixel.x, pixel.y, pixel.color)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelMessage {
    pub pixels: SmallVec<[WirePixel; 4]>,
}

impl PixelMessage {
    pub fn deltas(&self) -> impl Iterator<Item = PixelDelta> + '_ {
        self.pixels.iter().copied().map(PixelDelta::from)
    }
}

/// Server-to-client push message.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    Pixel(PixelMessage),
    Ping,
    Other {
        kind: String,
        body: serde_json::Value,
    },
}

impl ServerMessage {
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let body: serde_json::Value = serde_json::from_str(text)?;
        let kind = body
            .get("type")
            .and_then(serde_json::Value::as_str)
            .ok_or(ProtocolError::MissingType)?
            .to_string();
        match kind.as_str() {
            "pixel" => Ok(ServerMessage::Pixel(serde_json::from_value(body)?)),
            "ping" => Ok(ServerMessage::Ping),
            _ => Ok(ServerMessage::Other { kind, body }),
        }
    }

    pub fn kind(&self) -> &str {
        match self {
            ServerMessage::Pixel(_) => "pixel",
            ServerMessage::Ping => "ping",
            ServerMessage::Other { kind, .. } => kind,
        }
    }
}

/// Client-to-server push message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    Ping,
}

impl ClientMessage {
    pub fn encode(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INFO: &str = r#"{
        "canvasCode": "c42",
        "width": 3,
        "height": 2,
        "palette": [{"name": "Black", "value": "000000"}, {"name": "Red", "value": "FF0000"}],
        "cooldownInfo": {
            "type": "activity",
            "staticCooldownSeconds": 30,
            "activityCooldown": {"steepness": 1.0, "multiplier": 2.0, "globalOffset": 0.0, "userOffset": 0.0}
        },
        "heatmapCooldown": 900,
        "maxStacked": 6,
        "chatEnabled": true
    }"#;

    #[test]
    fn decodes_info_and_keeps_unknown_fields() {
        let response = InfoResponse::decode(INFO.as_bytes()).expect("decode info");
        assert_eq!(response.canvas_code, "c42");
        assert_eq!(
            response.extra.get("chatEnabled"),
            Some(&serde_json::Value::Bool(true))
        );
        assert_eq!(
            response.extra.get("heatmapCooldown"),
            Some(&serde_json::Value::from(900))
        );

        let info = BoardInfo::try_from(&response).expect("board info");
        assert_eq!(info.size, BoardSize::new(3, 2));
        assert_eq!(info.palette.len(), 2);
        assert_eq!(info.palette.packed(1), Some(0xff00_00ff));
    }

    #[test]
    fn rejects_zero_dimensions_and_bad_palette() {
        let mut response = InfoResponse::decode(INFO.as_bytes()).expect("decode info");
        response.width = 0;
        assert!(matches!(
            BoardInfo::try_from(&response),
            Err(ProtocolError::InvalidDimensions { width: 0, height: 2 })
        ));

        let mut response = InfoResponse::decode(INFO.as_bytes()).expect("decode info");
        response.palette[0].value = "nothex".to_string();
        assert!(matches!(
            BoardInfo::try_from(&response),
            Err(ProtocolError::Palette(_))
        ));
    }

    #[test]
    fn decodes_pixel_messages() {
        let message = ServerMessage::decode(
            r#"{"type":"pixel","pixels":[{"x":1,"y":2,"color":3},{"x":-4,"y":5,"color":0}]}"#,
        )
        .expect("decode pixel");
        let ServerMessage::Pixel(pixel) = message else {
            panic!("expected pixel message, got {message:?}");
        };
        let deltas: Vec<_> = pixel.deltas().collect();
        assert_eq!(
            deltas,
            vec![PixelDelta::new(1, 2, 3), PixelDelta::new(-4, 5, 0)]
        );
    }

    #[test]
    fn forwards_unknown_types_untouched() {
        let text = r#"{"type":"users","count":12}"#;
        let message = ServerMessage::decode(text).expect("decode users");
        assert_eq!(message.kind(), "users");
        let ServerMessage::Other { body, .. } = message else {
            panic!("expected passthrough");
        };
        assert_eq!(body["count"], 12);
    }

    #[test]
    fn malformed_messages_are_errors() {
        assert!(matches!(
            ServerMessage::decode("{not json"),
            Err(ProtocolError::Json(_))
        ));
        assert!(matches!(
            ServerMessage::decode(r#"{"count":1}"#),
            Err(ProtocolError::MissingType)
        ));
        assert!(matches!(
            ServerMessage::decode(r#"{"type":"pixel","pixels":[{"x":"a"}]}"#),
            Err(ProtocolError::Json(_))
        ));
    }

    #[test]
    fn keepalive_has_fixed_shape() {
        assert_eq!(
            ClientMessage::Ping.encode().expect("encode"),
            r#"{"type":"ping"}"#
        );
    }
}
