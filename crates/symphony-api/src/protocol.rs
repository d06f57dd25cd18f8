// Streaming protocol messages
//
// JSON text frames exchanged with the Symphony streaming endpoint. Every
// outgoing command shares the `{cmd, sessionid, source, tid}` envelope;
// responses are flat objects. Fields use `#[serde(default)]` liberally
// because the service omits fields that don't apply to a unit's hardware.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Error;

/// `source` value the web dashboard sends; the service expects it.
pub const SOURCE_DASHBOARD: &str = "consumer dashboard";

/// Version of [`READ_REGISTERS`]. Bump whenever the list changes so
/// consumers of the stored snapshots can tell the shapes apart.
pub const READ_REGISTERS_VERSION: u32 = 1;

/// Registers requested on every read.
///
/// Names are sent verbatim; the service answers with the lower-cased keys.
pub const READ_REGISTERS: &[&str] = &[
    "compressorpower",
    "fanpower",
    "auxpower",
    "looppumppower",
    "totalunitpower",
    "AWLABCType",
    "ModeOfOperation",
    "ActualCompressorSpeed",
    "AirflowCurrentSpeed",
    "AuroraOutputEH1",
    "AuroraOutputEH2",
    "AuroraOutputCC",
    "AuroraOutputCC2",
    "TStatDehumidSetpoint",
    "TStatRelativeHumidity",
    "LeavingAirTemp",
    "TStatRoomTemp",
    "EnteringWaterTemp",
    "AOCEnteringWaterTemp",
    "auroraoutputrv",
    "AWLTStatType",
    "humidity_offset_settings",
    "dehumid_humid_sp",
    "lockoutstatus",
    "lastfault",
    "lastlockout",
    "homeautomationalarm1",
    "homeautomationalarm2",
    "activesettings",
];

/// Write field carrying a new heating setpoint.
pub const HEATING_SETPOINT_FIELD: &str = "heatingsp_write";

/// Write field carrying a new cooling setpoint.
pub const COOLING_SETPOINT_FIELD: &str = "coolingsp_write";

// ── Requests ─────────────────────────────────────────────────────────

/// Command verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandKind {
    Login,
    Read,
    Write,
}

impl CommandKind {
    /// Wire name, also echoed back as the response's `rsp`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Read => "read",
            Self::Write => "write",
        }
    }
}

/// Outgoing command envelope.
///
/// `fields` is flattened into the top-level object, which is how write
/// commands carry their register updates.
#[derive(Debug, Clone, Serialize)]
pub struct Request {
    pub cmd: CommandKind,
    #[serde(rename = "sessionid", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub source: &'static str,
    pub tid: u32,
    #[serde(rename = "awlid", skip_serializing_if = "Option::is_none")]
    pub awl_id: Option<String>,
    #[serde(rename = "rlist", skip_serializing_if = "Option::is_none")]
    pub register_list: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone: Option<u32>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Request {
    fn envelope(cmd: CommandKind, session_id: &str, tid: u32) -> Self {
        Self {
            cmd,
            session_id: Some(session_id.to_owned()),
            source: SOURCE_DASHBOARD,
            tid,
            awl_id: None,
            register_list: None,
            zone: None,
            fields: Map::new(),
        }
    }

    /// Streaming login: authenticates the socket with the web session id.
    pub fn login(session_id: &str, tid: u32) -> Self {
        Self::envelope(CommandKind::Login, session_id, tid)
    }

    /// Read the fixed register list from one unit (zone 0).
    pub fn read(session_id: &str, tid: u32, awl_id: &str) -> Self {
        Self {
            awl_id: Some(awl_id.to_owned()),
            register_list: Some(READ_REGISTERS.iter().map(|r| (*r).to_owned()).collect()),
            zone: Some(0),
            ..Self::envelope(CommandKind::Read, session_id, tid)
        }
    }

    /// Write register updates to one unit (zone 0).
    pub fn write(session_id: &str, tid: u32, awl_id: &str, fields: Map<String, Value>) -> Self {
        Self {
            awl_id: Some(awl_id.to_owned()),
            zone: Some(0),
            fields,
            ..Self::envelope(CommandKind::Write, session_id, tid)
        }
    }

    /// Whether a response with this header answers this command: the
    /// `rsp` kind must match, and so must `awlid` when both carry one.
    ///
    /// `tid` is left out; the service uses it for its own bookkeeping.
    pub fn is_answered_by(&self, header: &ResponseHeader) -> bool {
        header.rsp == self.cmd.as_str()
            && match (self.awl_id.as_deref(), header.awl_id.as_deref()) {
                (Some(asked), Some(answered)) => asked.eq_ignore_ascii_case(answered),
                _ => true,
            }
    }

    /// Serialize into a text frame payload.
    pub fn to_payload(&self) -> Result<String, Error> {
        serde_json::to_string(self).map_err(|e| Error::Protocol {
            message: format!("failed to encode {:?} command: {e}", self.cmd),
        })
    }
}

/// Decode a text frame into a typed response.
pub fn decode<T: serde::de::DeserializeOwned>(payload: &str) -> Result<T, Error> {
    serde_json::from_str(payload).map_err(|e| Error::deserialization(&e, payload))
}

/// Fields every response carries; enough to pair it with its command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ResponseHeader {
    #[serde(default)]
    pub rsp: String,
    #[serde(default, rename = "awlid")]
    pub awl_id: Option<String>,
}

// ── Login response ───────────────────────────────────────────────────

/// Answer to the streaming `login` command.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub rsp: String,
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub tid: Option<u32>,
    #[serde(default)]
    pub err: Option<String>,
    #[serde(default, rename = "firstname")]
    pub first_name: Option<String>,
    #[serde(default, rename = "lastname")]
    pub last_name: Option<String>,
    #[serde(default, rename = "emailaddress")]
    pub email_address: Option<String>,
    #[serde(default)]
    pub key: Option<i64>,
    #[serde(default)]
    pub locations: Vec<Location>,
}

impl LoginResponse {
    /// Every gateway of every location, in response order.
    pub fn gateways(&self) -> Vec<Gateway> {
        self.locations
            .iter()
            .flat_map(|location| location.gateways.iter().cloned())
            .collect()
    }
}

/// A site registered on the account.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "postal")]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub gateways: Vec<Gateway>,
}

/// Roster entry: one HVAC unit as the service sees it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Gateway {
    #[serde(rename = "gwid")]
    pub gateway_id: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "tstat_name")]
    pub thermostat_name: Option<String>,
    #[serde(default)]
    pub online: bool,
    #[serde(default, rename = "awlabctype")]
    pub abc_type: AbcType,
    #[serde(default, rename = "awlabctypedesc")]
    pub abc_type_description: Option<String>,
    #[serde(default, rename = "awltstattype")]
    pub thermostat_type: Option<i64>,
    #[serde(default, rename = "awltstattypedesc")]
    pub thermostat_type_description: Option<String>,
    #[serde(default, rename = "iz2_max_zones")]
    pub intellizone_max_zones: Option<i64>,
    #[serde(default, rename = "blowertype")]
    pub blower_type: Option<i64>,
    /// Catch-all for undocumented fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Gateway {
    /// Name shown for the unit: the thermostat name, else the description.
    pub fn display_name(&self) -> &str {
        self.thermostat_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .or(self.description.as_deref())
            .unwrap_or_default()
    }
}

// ── Enumerations ─────────────────────────────────────────────────────

/// Compressor classification reported as `awlabctype`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum AbcType {
    #[default]
    Unknown,
    SingleSpeed,
    DualSpeed,
    VariableSpeed,
}

impl From<i64> for AbcType {
    fn from(value: i64) -> Self {
        match value {
            1 => Self::SingleSpeed,
            2 => Self::DualSpeed,
            3 => Self::VariableSpeed,
            _ => Self::Unknown,
        }
    }
}

impl From<AbcType> for i64 {
    fn from(value: AbcType) -> Self {
        match value {
            AbcType::Unknown => 0,
            AbcType::SingleSpeed => 1,
            AbcType::DualSpeed => 2,
            AbcType::VariableSpeed => 3,
        }
    }
}

/// What the unit is doing right now (`modeofoperation`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum ModeOfOperation {
    #[default]
    Standby,
    FanOnly,
    Cooling1,
    Cooling2,
    Reheat,
    Heating1,
    Heating2,
    EmergencyHeat,
    AuxHeat,
    Lockout,
    Other(i64),
}

impl From<i64> for ModeOfOperation {
    fn from(value: i64) -> Self {
        match value {
            0 => Self::Standby,
            1 => Self::FanOnly,
            2 => Self::Cooling1,
            3 => Self::Cooling2,
            4 => Self::Reheat,
            5 => Self::Heating1,
            6 => Self::Heating2,
            7 => Self::EmergencyHeat,
            8 => Self::AuxHeat,
            9 => Self::Lockout,
            other => Self::Other(other),
        }
    }
}

impl From<ModeOfOperation> for i64 {
    fn from(value: ModeOfOperation) -> Self {
        match value {
            ModeOfOperation::Standby => 0,
            ModeOfOperation::FanOnly => 1,
            ModeOfOperation::Cooling1 => 2,
            ModeOfOperation::Cooling2 => 3,
            ModeOfOperation::Reheat => 4,
            ModeOfOperation::Heating1 => 5,
            ModeOfOperation::Heating2 => 6,
            ModeOfOperation::EmergencyHeat => 7,
            ModeOfOperation::AuxHeat => 8,
            ModeOfOperation::Lockout => 9,
            ModeOfOperation::Other(other) => other,
        }
    }
}

/// Thermostat mode selected by the user (`activesettings.activemode`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum ThermostatMode {
    #[default]
    Off,
    Auto,
    Cool,
    Heat,
    EmergencyHeat,
    Other(i64),
}

impl From<i64> for ThermostatMode {
    fn from(value: i64) -> Self {
        match value {
            0 => Self::Off,
            1 => Self::Auto,
            2 => Self::Cool,
            3 => Self::Heat,
            4 => Self::EmergencyHeat,
            other => Self::Other(other),
        }
    }
}

impl From<ThermostatMode> for i64 {
    fn from(value: ThermostatMode) -> Self {
        match value {
            ThermostatMode::Off => 0,
            ThermostatMode::Auto => 1,
            ThermostatMode::Cool => 2,
            ThermostatMode::Heat => 3,
            ThermostatMode::EmergencyHeat => 4,
            ThermostatMode::Other(other) => other,
        }
    }
}

// ── Read response ────────────────────────────────────────────────────

/// Answer to a `read` command, keyed by the lower-cased register names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReadResponse {
    #[serde(default)]
    pub rsp: String,
    #[serde(default, rename = "awlid")]
    pub awl_id: Option<String>,
    #[serde(default)]
    pub tid: Option<u32>,
    #[serde(default)]
    pub err: Option<String>,
    #[serde(default)]
    pub zone: i64,

    // Power draw, watts
    #[serde(default, rename = "compressorpower")]
    pub compressor_power: i64,
    #[serde(default, rename = "fanpower")]
    pub fan_power: i64,
    #[serde(default, rename = "auxpower")]
    pub aux_power: i64,
    #[serde(default, rename = "looppumppower")]
    pub loop_pump_power: i64,
    #[serde(default, rename = "totalunitpower")]
    pub total_unit_power: i64,

    #[serde(default, rename = "awlabctype")]
    pub abc_type: AbcType,
    #[serde(default, rename = "modeofoperation")]
    pub mode_of_operation: ModeOfOperation,
    #[serde(default, rename = "actualcompressorspeed")]
    pub actual_compressor_speed: i64,
    #[serde(default, rename = "airflowcurrentspeed")]
    pub airflow_current_speed: i64,
    #[serde(default, rename = "auroraoutputeh1")]
    pub aurora_output_eh1: i64,
    #[serde(default, rename = "auroraoutputeh2")]
    pub aurora_output_eh2: i64,
    #[serde(default, rename = "auroraoutputcc")]
    pub aurora_output_cc: i64,
    #[serde(default, rename = "auroraoutputcc2")]
    pub aurora_output_cc2: i64,
    #[serde(default, rename = "auroraoutputrv")]
    pub aurora_output_rv: i64,
    #[serde(default, rename = "tstatdehumidsetpoint")]
    pub dehumidify_setpoint: i64,
    #[serde(default, rename = "tstatrelativehumidity")]
    pub relative_humidity: i64,

    // Temperatures, °F
    #[serde(default, rename = "leavingairtemp")]
    pub leaving_air_temp: f64,
    #[serde(default, rename = "tstatroomtemp")]
    pub room_temp: f64,
    #[serde(default, rename = "enteringwatertemp")]
    pub entering_water_temp: f64,
    #[serde(default, rename = "aocenteringwatertemp")]
    pub aoc_entering_water_temp: f64,

    #[serde(default, rename = "awltstattype")]
    pub thermostat_type: i64,
    #[serde(default)]
    pub humidity_offset_settings: Option<HumidityOffsetSettings>,
    #[serde(default, rename = "dehumid_humid_sp")]
    pub humidity_setpoints: Option<HumiditySetpoints>,
    #[serde(default, rename = "lockoutstatus")]
    pub lockout_status: Option<LockoutStatus>,
    #[serde(default, rename = "lastfault")]
    pub last_fault: i64,
    #[serde(default, rename = "lastlockout")]
    pub last_lockout: Option<LastLockout>,
    #[serde(default, rename = "homeautomationalarm1")]
    pub home_automation_alarm1: i64,
    #[serde(default, rename = "homeautomationalarm2")]
    pub home_automation_alarm2: i64,
    #[serde(default, rename = "activesettings")]
    pub active_settings: Option<ActiveSettings>,
}

impl ReadResponse {
    /// `Err` if the service flagged the read as failed.
    pub fn check(self) -> Result<Self, Error> {
        match self.err.as_deref() {
            Some(err) if !err.is_empty() => Err(Error::Protocol {
                message: format!("read failed: {err}"),
            }),
            _ => Ok(self),
        }
    }
}

/// Active thermostat settings block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActiveSettings {
    #[serde(default, rename = "temporaryoverride")]
    pub temporary_override: i64,
    #[serde(default, rename = "permanenthold")]
    pub permanent_hold: i64,
    #[serde(default, rename = "vacationhold")]
    pub vacation_hold: i64,
    #[serde(default, rename = "onpeakhold")]
    pub on_peak_hold: i64,
    #[serde(default, rename = "superboost")]
    pub superboost: i64,
    #[serde(default, rename = "tstatmode")]
    pub thermostat_mode: i64,
    #[serde(default, rename = "activemode")]
    pub active_mode: ThermostatMode,
    #[serde(default, rename = "heatingsp_read")]
    pub heating_setpoint: f64,
    #[serde(default, rename = "coolingsp_read")]
    pub cooling_setpoint: f64,
    #[serde(default, rename = "fanmode_read")]
    pub fan_mode: i64,
    #[serde(default, rename = "intertimeon_read")]
    pub intermittent_time_on: i64,
    #[serde(default, rename = "intertimeoff_read")]
    pub intermittent_time_off: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HumiditySetpoints {
    #[serde(default)]
    pub dehumidification: i64,
    #[serde(default)]
    pub humidification: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HumidityOffsetSettings {
    #[serde(default)]
    pub humidity_offset: i64,
    /// The service spells this key without the second "i".
    #[serde(default, rename = "humdity_control_option")]
    pub humidity_control_option: i64,
    #[serde(default)]
    pub dehumidification_mode: i64,
    #[serde(default)]
    pub humidification_mode: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LastLockout {
    #[serde(default, rename = "lockoutstatuslast")]
    pub lockout_status_last: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LockoutStatus {
    #[serde(default, rename = "lockoutstatuscode")]
    pub lockout_status_code: i64,
    #[serde(default, rename = "lockedout")]
    pub locked_out: i64,
}

// ── Tests ────────────────────────────────────────────────────────────
