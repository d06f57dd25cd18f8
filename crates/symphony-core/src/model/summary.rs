// ── Operating summary ──
//
// Display-oriented view of a read response: what the unit is doing, what
// it draws, and what it is aiming for.

use serde::Serialize;
use symphony_api::protocol::{AbcType, ModeOfOperation, ReadResponse, ThermostatMode};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperatingSummary {
    pub mode: String,
    pub thermostat_mode: Option<ThermostatMode>,
    pub compressor_power_watts: i64,
    pub fan_power_watts: i64,
    pub aux_power_watts: i64,
    pub loop_pump_power_watts: i64,
    pub total_power_watts: i64,
    pub room_temperature: f64,
    pub entering_water_temperature: f64,
    pub leaving_air_temperature: f64,
    pub relative_humidity: i64,
    pub heating_setpoint: Option<f64>,
    pub cooling_setpoint: Option<f64>,
    pub locked_out: bool,
}

impl From<&ReadResponse> for OperatingSummary {
    fn from(read: &ReadResponse) -> Self {
        let active = read.active_settings.as_ref();
        Self {
            mode: mode_label(read),
            thermostat_mode: active.map(|a| a.active_mode),
            compressor_power_watts: read.compressor_power,
            fan_power_watts: read.fan_power,
            aux_power_watts: read.aux_power,
            loop_pump_power_watts: read.loop_pump_power,
            total_power_watts: read.total_unit_power,
            room_temperature: read.room_temp,
            entering_water_temperature: read.entering_water_temp,
            leaving_air_temperature: read.leaving_air_temp,
            relative_humidity: read.relative_humidity,
            heating_setpoint: active.map(|a| a.heating_setpoint),
            cooling_setpoint: active.map(|a| a.cooling_setpoint),
            locked_out: read
                .lockout_status
                .as_ref()
                .is_some_and(|l| l.locked_out != 0),
        }
    }
}

impl OperatingSummary {
    pub fn total_power_label(&self) -> String {
        watts(self.total_power_watts)
    }

    fn entering_water_label(&self) -> String {
        format!(
            "Entering water temperature: {}°F",
            self.entering_water_temperature
        )
    }

    /// One line per reading, for console output.
    pub fn lines(&self) -> Vec<String> {
        let mut lines = vec![
            format!("Mode: {}", self.mode),
            format!("Room temperature: {}°F", self.room_temperature),
            self.entering_water_label(),
            format!(
                "Power: compressor {}, fan {}, aux {}, loop pump {}, total {}",
                watts(self.compressor_power_watts),
                watts(self.fan_power_watts),
                watts(self.aux_power_watts),
                watts(self.loop_pump_power_watts),
                watts(self.total_power_watts),
            ),
        ];
        if let (Some(heat), Some(cool)) = (self.heating_setpoint, self.cooling_setpoint) {
            lines.push(format!("Setpoints: heat {heat}°F, cool {cool}°F"));
        }
        if self.locked_out {
            lines.push("LOCKED OUT".to_owned());
        }
        lines
    }
}

fn watts(value: i64) -> String {
    format!("{value}W")
}

/// Human label for the current mode of operation.
///
/// Variable-speed units report the compressor speed instead of a stage.
pub fn mode_label(read: &ReadResponse) -> String {
    let variable = read.abc_type == AbcType::VariableSpeed;
    let staged = |verb: &str, stage: u8| {
        if variable {
            format!("{verb} Speed {}", read.actual_compressor_speed)
        } else {
            format!("{verb} Stage {stage}")
        }
    };

    match read.mode_of_operation {
        ModeOfOperation::Standby => "Standby".to_owned(),
        ModeOfOperation::FanOnly => "Fan only".to_owned(),
        ModeOfOperation::Cooling1 => staged("Cooling", 1),
        ModeOfOperation::Cooling2 => staged("Cooling", 2),
        ModeOfOperation::Heating1 => staged("Heating", 1),
        ModeOfOperation::Heating2 => staged("Heating", 2),
        ModeOfOperation::Reheat => "Reheat".to_owned(),
        ModeOfOperation::EmergencyHeat => "Emergency Heat".to_owned(),
        ModeOfOperation::AuxHeat => "Aux Heat".to_owned(),
        ModeOfOperation::Lockout => "Lockout".to_owned(),
        ModeOfOperation::Other(code) => format!("Unknown ({code})"),
    }
}

#[cfg(test)]
mod tests {
    use symphony_api::protocol::{ActiveSettings, LockoutStatus};

    use super::*;

    fn read(mode: ModeOfOperation, abc: AbcType, speed: i64) -> ReadResponse {
        ReadResponse {
            mode_of_operation: mode,
            abc_type: abc,
            actual_compressor_speed: speed,
            ..ReadResponse::default()
        }
    }

    #[test]
    fn staged_units_report_stage() {
        let r = read(ModeOfOperation::Cooling2, AbcType::DualSpeed, 0);
        assert_eq!(mode_label(&r), "Cooling Stage 2");
        let r = read(ModeOfOperation::Heating1, AbcType::SingleSpeed, 0);
        assert_eq!(mode_label(&r), "Heating Stage 1");
    }

    #[test]
    fn variable_speed_reports_speed() {
        let r = read(ModeOfOperation::Heating2, AbcType::VariableSpeed, 9);
        assert_eq!(mode_label(&r), "Heating Speed 9");
    }

    #[test]
    fn fixed_labels() {
        let label = |mode| mode_label(&read(mode, AbcType::Unknown, 0));
        assert_eq!(label(ModeOfOperation::Standby), "Standby");
        assert_eq!(label(ModeOfOperation::FanOnly), "Fan only");
        assert_eq!(label(ModeOfOperation::AuxHeat), "Aux Heat");
        assert_eq!(label(ModeOfOperation::Other(12)), "Unknown (12)");
    }

    #[test]
    fn summary_collects_setpoints_and_power() {
        let r = ReadResponse {
            total_unit_power: 1830,
            entering_water_temp: 44.5,
            active_settings: Some(ActiveSettings {
                active_mode: ThermostatMode::Heat,
                heating_setpoint: 69.0,
                cooling_setpoint: 75.0,
                ..ActiveSettings::default()
            }),
            lockout_status: Some(LockoutStatus {
                lockout_status_code: 0,
                locked_out: 0,
            }),
            ..ReadResponse::default()
        };
        let summary = OperatingSummary::from(&r);
        assert_eq!(summary.total_power_label(), "1830W");
        assert_eq!(summary.entering_water_label(), "Entering water temperature: 44.5°F");
        assert_eq!(summary.heating_setpoint, Some(69.0));
        assert_eq!(summary.thermostat_mode, Some(ThermostatMode::Heat));
        assert!(!summary.locked_out);
        assert!(summary.lines().iter().any(|l| l.starts_with("Setpoints:")));
    }
}
