//! Shared types between the traffic controller API and its clients
//!
//! These types are used by:
//! - the Dioxus web console (WASM)
//! - any native tooling that talks to the controller
//!
//! Serializable with serde for JSON over HTTP

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Lanes
// ============================================================================

/// Lanes the console offers emergency overrides for.
pub const EMERGENCY_LANES: [&str; 4] = ["NORTH", "SOUTH", "EAST", "WEST"];

/// Highest density bucket reported by the controller.
pub const MAX_DENSITY: u8 = 5;

/// Lane identifier as reported by the controller (e.g. "NORTH").
///
/// Snapshots may carry arbitrary keys; only [`EMERGENCY_LANES`] are
/// offered as override targets.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct LaneId(pub String);

impl LaneId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn emergency_targets() -> Vec<LaneId> {
        EMERGENCY_LANES.iter().map(|id| LaneId::new(*id)).collect()
    }
}

impl fmt::Display for LaneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalLight {
    Green,
    Yellow,
    Red,
}

impl SignalLight {
    pub fn as_str(self) -> &'static str {
        match self {
            SignalLight::Green => "GREEN",
            SignalLight::Yellow => "YELLOW",
            SignalLight::Red => "RED",
        }
    }
}

impl fmt::Display for SignalLight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct LaneState {
    pub count: u32,
    pub density: u8,
    pub light: SignalLight,
}

impl LaneState {
    /// Density bucket clamped to `0..=MAX_DENSITY`.
    pub fn density_level(&self) -> u8 {
        self.density.min(MAX_DENSITY)
    }
}

// ============================================================================
// Congestion
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum CongestionLevel {
    Low,
    Medium,
    High,
}

impl CongestionLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            CongestionLevel::Low => "LOW",
            CongestionLevel::Medium => "MEDIUM",
            CongestionLevel::High => "HIGH",
        }
    }
}

impl fmt::Display for CongestionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Congestion {
    pub level: CongestionLevel,
    /// Model confidence in `[0, 1]`
    pub confidence: f64,
}

impl Congestion {
    pub fn confidence_percent(&self) -> u8 {
        let percent = (self.confidence * 100.0).round();
        if percent.is_nan() {
            return 0;
        }
        percent.clamp(0.0, 100.0) as u8
    }
}

// ============================================================================
// Status
// ============================================================================

/// One complete state report from `GET /api/status`.
///
/// Clients replace their previous snapshot wholesale; there is no partial merge.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusSnapshot {
    pub active_lane: LaneId,
    pub lanes: BTreeMap<LaneId, LaneState>,
    pub emergency_active: bool,
    pub congestion: Congestion,
    /// Seconds until the next signal change. Signed so that a misbehaving
    /// controller does not fail decoding; clients clamp it to zero.
    pub remaining_time: i64,
}

impl StatusSnapshot {
    pub fn lane(&self, id: &LaneId) -> Option<&LaneState> {
        self.lanes.get(id)
    }

    pub fn has_lane(&self, id: &LaneId) -> bool {
        self.lanes.contains_key(id)
    }

    /// Light of the active lane, GREEN if the controller omitted it.
    pub fn active_light(&self) -> SignalLight {
        self.lanes
            .get(&self.active_lane)
            .map(|lane| lane.light)
            .unwrap_or(SignalLight::Green)
    }
}

// ============================================================================
// Commands
// ============================================================================

/// Body of `POST /api/emergency`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmergencyRequest {
    pub lane: LaneId,
}

/// Body of `POST /api/ai-chat`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AiChatRequest {
    pub message: String,
}

/// Reply of `POST /api/ai-chat`: either `{response}` or `{error}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AiChatReply {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============================================================================
// Chat transcript
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// Transcript entry. `id` and `timestamp` are assigned client-side.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub id: String,
    pub role: ChatRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(ChatRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(ChatRole::Assistant, content)
    }
}

// ============================================================================
// Tests
// ============================================================================
