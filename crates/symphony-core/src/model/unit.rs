// ── Unit identity and record ──

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use symphony_api::Gateway;
use symphony_api::protocol::{AbcType, READ_REGISTERS_VERSION, ReadResponse};

/// Stable registry key for a unit: `awl-` plus the lower-cased gateway id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitId(String);

impl UnitId {
    pub const PREFIX: &'static str = "awl-";

    pub fn from_gateway_id(gateway_id: &str) -> Self {
        Self(format!("{}{}", Self::PREFIX, gateway_id.to_ascii_lowercase()))
    }

    /// Accept either a unit id or a bare gateway id.
    pub fn parse_lenient(input: &str) -> Self {
        let lowered = input.trim().to_ascii_lowercase();
        match lowered.strip_prefix(Self::PREFIX) {
            Some(_) => Self(lowered),
            None => Self::from_gateway_id(&lowered),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&Gateway> for UnitId {
    fn from(gateway: &Gateway) -> Self {
        Self::from_gateway_id(&gateway.gateway_id)
    }
}

/// Product line, derived from the compressor type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
pub enum Series {
    #[strum(serialize = "5 Series")]
    #[serde(rename = "5 Series")]
    FiveSeries,
    #[strum(serialize = "7 Series")]
    #[serde(rename = "7 Series")]
    SevenSeries,
    #[strum(serialize = "Unknown")]
    Unknown,
}

impl From<AbcType> for Series {
    fn from(abc: AbcType) -> Self {
        match abc {
            AbcType::SingleSpeed | AbcType::DualSpeed => Self::FiveSeries,
            AbcType::VariableSpeed => Self::SevenSeries,
            AbcType::Unknown => Self::Unknown,
        }
    }
}

/// Immutable snapshot of one unit.
///
/// Published whole through the registry; updating a unit means building a
/// new record, never mutating one in place.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitRecord {
    pub unit_id: UnitId,
    /// Gateway id as the service spells it, sent as `awlid`.
    pub awl_id: String,
    pub display_name: String,
    pub series: Series,
    pub online: bool,
    pub last_read: Option<Arc<ReadResponse>>,
    /// Version of the register list `last_read` was requested with.
    pub read_version: Option<u32>,
    pub refreshed_at: Option<DateTime<Utc>>,
}

impl UnitRecord {
    pub fn from_gateway(gateway: &Gateway) -> Self {
        Self {
            unit_id: UnitId::from(gateway),
            awl_id: gateway.gateway_id.clone(),
            display_name: gateway.display_name().to_owned(),
            series: Series::from(gateway.abc_type),
            online: gateway.online,
            last_read: None,
            read_version: None,
            refreshed_at: None,
        }
    }

    pub(crate) fn renamed(&self, name: &str) -> Self {
        Self {
            display_name: name.to_owned(),
            ..self.clone()
        }
    }

    pub(crate) fn with_connection(&self, online: bool) -> Self {
        Self {
            online,
            ..self.clone()
        }
    }

    pub(crate) fn with_read(&self, read: Arc<ReadResponse>, at: DateTime<Utc>) -> Self {
        Self {
            online: true,
            last_read: Some(read),
            read_version: Some(READ_REGISTERS_VERSION),
            refreshed_at: Some(at),
            ..self.clone()
        }
    }
}
