use serde::{Deserialize, Serialize};

pub mod codec;

pub use codec::{decode_server_message, encode_client_message, encode_server_message, CodecError};

pub const DEFAULT_ENDPOINT: &str = "ws://127.0.0.1:43210";
pub const RECONNECT_DELAY_MS: u64 = 3000;
pub const FOOD_COLOUR: Colour = Colour { r: 0, g: 255, b: 0 };
/// Largest arena width or height accepted from the server. The client
/// allocates one tile per cell, so this bounds the grid size.
pub const MAX_ARENA_SIDE: usize = 1024;

/// Grid coordinate. Signed so that a misbehaving server's negative
/// coordinates decode and can be reported by the grid builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i64,
    pub y: i64,
}

impl Point {
    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Colour {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Colour {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

/// Snake body, head first. Decoding rejects an empty body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SnakeWire")]
pub struct Snake {
    pub parts: Vec<Point>,
    pub colour: Colour,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
}

#[derive(Deserialize)]
struct SnakeWire {
    parts: Vec<Point>,
    colour: Colour,
    #[serde(default)]
    direction: Option<Direction>,
}

impl TryFrom<SnakeWire> for Snake {
    type Error = String;

    fn try_from(wire: SnakeWire) -> Result<Self, Self::Error> {
        if wire.parts.is_empty() {
            return Err("snake must have at least one part".to_string());
        }
        Ok(Snake {
            parts: wire.parts,
            colour: wire.colour,
            direction: wire.direction,
        })
    }
}

impl Snake {
    pub fn new(parts: Vec<Point>, colour: Colour) -> Self {
        Self {
            parts,
            colour,
            direction: None,
        }
    }
}

/// A roster entry. The server sends it as a `[snake, id, name, score]` tuple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "PlayerWire", into = "PlayerWire")]
pub struct Player {
    pub snake: Snake,
    pub id: String,
    pub name: String,
    pub score: u64,
}

#[derive(Serialize, Deserialize)]
struct PlayerWire(Snake, String, String, u64);

impl From<PlayerWire> for Player {
    fn from(PlayerWire(snake, id, name, score): PlayerWire) -> Self {
        Player {
            snake,
            id,
            name,
            score,
        }
    }
}

impl From<Player> for PlayerWire {
    fn from(player: Player) -> Self {
        PlayerWire(player.snake, player.id, player.name, player.score)
    }
}

impl Player {
    pub fn new(id: impl Into<String>, name: impl Into<String>, snake: Snake, score: u64) -> Self {
        Self {
            snake,
            id: id.into(),
            name: name.into(),
            score,
        }
    }

    pub fn colour(&self) -> Colour {
        self.snake.colour
    }
}

/// Arena dimensions as announced by the server on registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arena {
    pub width: usize,
    pub height: usize,
}

impl Arena {
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x >= 0
            && point.y >= 0
            && (point.x as u64) < self.width as u64
            && (point.y as u64) < self.height as u64
    }
}

/// Commands sent from the client to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientMessage {
    Register { name: String },
    Turn { direction: Direction },
}

impl ClientMessage {
    pub fn register(name: impl Into<String>) -> Self {
        ClientMessage::Register { name: name.into() }
    }

    pub fn turn(direction: Direction) -> Self {
        ClientMessage::Turn { direction }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterPayload {
    pub field_width: usize,
    pub field_height: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
}

impl RegisterPayload {
    pub fn arena(&self) -> Arena {
        Arena::new(self.field_width, self.field_height)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnPayload {
    pub players: Vec<Player>,
    #[serde(default)]
    pub food: Vec<Point>,
}

/// Events pushed by the server. Tags outside the known set decode to
/// `Unknown` so that handlers can skip them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    Register(RegisterPayload),
    Turn(TurnPayload),
    Unknown { tag: String },
}

impl ServerMessage {
    pub fn tag(&self) -> &str {
        match self {
            ServerMessage::Register(_) => "Register",
            ServerMessage::Turn(_) => "Turn",
            ServerMessage::Unknown { tag } => tag,
        }
    }
}
