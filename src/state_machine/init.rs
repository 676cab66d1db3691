//! Init sub-sequencer (C9): the ordered CFG-*/AID-INI exchange that
//! brings a freshly powered receiver to COLD/WARM/HOT start, with
//! per-phase retry and escalation to a cold reinit on exhaustion.
//!
//! Grounded on `ubgps_internal.h`'s `init_phase`/`init_count`/
//! `init_retry_done`/`is_reinit`/`reinit_cold` fields and the
//! `ubgps_send_cfg_*`/`ubgps_send_aid_ini`/`ubgps_send_aid_alp_poll`
//! prototype ordering. CFG-ANT and CFG-CFG are not part of the mandatory
//! sequence (SPEC_FULL.md §4.9) — they're caller-invoked operations, not
//! init phases.

use crate::config::{self, DriverConfig};
use crate::ubx::messages::AidIni;
use crate::ubx::UbxFrame;

use super::{GpsState, InitOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    DisableNmea,
    CfgMsgNavPvt,
    CfgRate,
    CfgNav5,
    CfgPm2,
    CfgRxm,
    CfgSbas,
    AidIni,
    AidAlpPoll,
    Done,
}

impl Phase {
    /// Fixed order per spec.md §4.9: NAV5 → PM2 → RXM → optional SBAS →
    /// AID-INI → AID-ALP poll. PM2 is sent unconditionally — even a
    /// disabled power-save mode is still a configuration phase, not an
    /// optional one; only SBAS is gated on `config.sbas_enabled`.
    fn next(self, config: &DriverConfig) -> Phase {
        match self {
            Phase::DisableNmea => Phase::CfgMsgNavPvt,
            Phase::CfgMsgNavPvt => Phase::CfgRate,
            Phase::CfgRate => Phase::CfgNav5,
            Phase::CfgNav5 => Phase::CfgPm2,
            Phase::CfgPm2 => Phase::CfgRxm,
            Phase::CfgRxm => {
                if config.sbas_enabled {
                    Phase::CfgSbas
                } else {
                    Phase::AidIni
                }
            }
            Phase::CfgSbas => Phase::AidIni,
            Phase::AidIni => Phase::AidAlpPoll,
            Phase::AidAlpPoll | Phase::Done => Phase::Done,
        }
    }
}

/// What the driver should do after feeding the sequencer an ACK, NAK, or
/// phase timeout.
pub enum StepResult {
    /// Send this frame and wait for its ACK/NAK (same phase, a retry).
    Retry(UbxFrame),
    /// Advance: send this frame for the next phase.
    SendNext(UbxFrame),
    /// Sequence complete, enter the named state or report failure.
    Finished(InitOutcome),
}

pub struct InitSequencer {
    phase: Phase,
    retries_left: u32,
    config: DriverConfig,
    aid_ini: AidIni,
    already_reinit_cold: bool,
    hint_available: bool,
    aid_fresh: bool,
}

impl InitSequencer {
    pub fn new(config: DriverConfig, aid_ini: AidIni, already_reinit_cold: bool, hint_available: bool, aid_fresh: bool) -> Self {
        let retries_left = config.init_retry_count;
        InitSequencer {
            phase: Phase::DisableNmea,
            retries_left,
            config,
            aid_ini,
            already_reinit_cold,
            hint_available,
            aid_fresh,
        }
    }

    /// The first frame to send, kicking off the sequence.
    pub fn start(&self) -> UbxFrame {
        self.frame_for(self.phase)
    }

    fn frame_for(&self, phase: Phase) -> UbxFrame {
        match phase {
            Phase::DisableNmea => config::send_cfg_prt_disable_nmea(9600),
            Phase::CfgMsgNavPvt => config::send_cfg_msg(0x01, 0x07, 1), // NAV-PVT @ nav rate
            Phase::CfgRate => config::send_cfg_rate(self.config.navigation_rate_ms),
            Phase::CfgNav5 => config::send_cfg_nav5(&self.config),
            Phase::CfgPm2 => config::send_cfg_pm2(
                self.config.psm_flags,
                self.config.psm_update_period_ms,
                self.config.psm_search_period_ms,
            ),
            Phase::CfgRxm => config::send_cfg_rxm(self.config.rxm_low_power_mode),
            Phase::CfgSbas => config::send_cfg_sbas(true),
            Phase::AidIni => config::send_aid_ini(&self.aid_ini),
            Phase::AidAlpPoll => config::send_aid_alp_poll(),
            Phase::Done => unreachable!("no frame is sent once the sequence is done"),
        }
    }

    pub fn on_ack(&mut self) -> StepResult {
        self.retries_left = self.config.init_retry_count;
        self.phase = self.phase.next(&self.config);
        self.step_or_finish()
    }

    pub fn on_nak(&mut self) -> StepResult {
        self.on_failure()
    }

    pub fn on_timeout(&mut self) -> StepResult {
        self.on_failure()
    }

    fn on_failure(&mut self) -> StepResult {
        if self.retries_left > 0 {
            self.retries_left -= 1;
            return StepResult::Retry(self.frame_for(self.phase));
        }
        if self.already_reinit_cold {
            StepResult::Finished(InitOutcome::Failed { reinit_cold: false })
        } else {
            StepResult::Finished(InitOutcome::Failed { reinit_cold: true })
        }
    }

    fn step_or_finish(&mut self) -> StepResult {
        if self.phase == Phase::Done {
            StepResult::Finished(InitOutcome::Enter(self.resolved_state()))
        } else {
            StepResult::SendNext(self.frame_for(self.phase))
        }
    }

    fn resolved_state(&self) -> GpsState {
        if self.aid_fresh {
            GpsState::HotStart
        } else if self.hint_available {
            GpsState::WarmStart
        } else {
            GpsState::ColdStart
        }
    }
}
