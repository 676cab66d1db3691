//! Configuration exchange layer (C7): typed senders for CFG-* and AID-*
//! messages, plus [`DriverConfig`], the knobs the original header left
//! unconfigurable (init retry count, dynamic model, hint refresh
//! threshold — see SPEC_FULL.md §9).

use crate::ubx::messages::{
    AidAlpPoll, AidIni, CfgAnt, CfgCfg, CfgCfgAction, CfgMsg, CfgNav5, CfgPm2, CfgPrtUart, CfgRate,
    CfgRst, CfgRxm, CfgSbas, DynamicModel, UbxMessage, PROTO_NMEA, PROTO_UBX, UART_MODE_8N1,
};
use crate::ubx::UbxFrame;

/// Host-tunable defaults. Two of these resolve Open Questions from
/// spec.md §9 that the original C header left implicit.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Retries per init phase before declaring init failure (spec.md §4.9).
    /// Default 1 (two attempts total), matching the single `init_retry_done`
    /// flag's natural generalization.
    pub init_retry_count: u32,
    /// CFG-NAV5 dynamic platform model. Default `Automotive`, matching
    /// `NAV5_DYNAMIC_MODEL` in the original header.
    pub dynamic_model: DynamicModel,
    /// CFG-RATE navigation rate in ms. Default 1000, matching
    /// `DEFAULT_NAVIGATION_RATE`.
    pub navigation_rate_ms: u16,
    /// Minimum accuracy improvement (mm) required before a fix refreshes
    /// the location hint. `u32::MAX` preserves the original's
    /// `HINT_LOCATION_MINIMUM_NEW_ACCURACY = INT_MAX`, i.e. every fix
    /// refreshes the hint unconditionally.
    pub hint_minimum_new_accuracy_mm: u32,
    /// Whether to enable SBAS during init.
    pub sbas_enabled: bool,
    /// CFG-RXM low-power mode (0 = continuous).
    pub rxm_low_power_mode: u8,
    /// CFG-PM2 flags/update/search periods, used only if PSM is requested.
    pub psm_flags: u32,
    pub psm_update_period_ms: u32,
    pub psm_search_period_ms: u32,
    /// ACK/NAK dispatcher wait timeout per phase.
    pub ack_timeout: std::time::Duration,
}

impl Default for DriverConfig {
    fn default() -> Self {
        DriverConfig {
            init_retry_count: 1,
            dynamic_model: DynamicModel::default(),
            navigation_rate_ms: 1000,
            hint_minimum_new_accuracy_mm: u32::MAX,
            sbas_enabled: true,
            rxm_low_power_mode: 0,
            psm_flags: 0,
            psm_update_period_ms: 0,
            psm_search_period_ms: 0,
            ack_timeout: std::time::Duration::from_secs(1),
        }
    }
}

fn frame<M: UbxMessage>(msg: &M) -> UbxFrame {
    UbxFrame::new(M::CLASS, M::ID, msg.to_payload())
}

/// Configure the active port for UBX-only traffic at `baud`.
pub fn send_cfg_prt(baud: u32) -> UbxFrame {
    frame(&CfgPrtUart {
        port_id: 1,
        tx_ready: 0,
        mode: UART_MODE_8N1,
        baud_rate: baud,
        in_proto_mask: PROTO_UBX,
        out_proto_mask: PROTO_UBX,
        flags: 0,
    })
}

/// Disable NMEA on the active port while leaving UBX enabled (used during
/// the "disable NMEA output" init phase; differs from `send_cfg_prt` only
/// in that it is explicit about the transition away from NMEA).
pub fn send_cfg_prt_disable_nmea(baud: u32) -> UbxFrame {
    let _ = PROTO_NMEA; // documents the bit being cleared, not set
    send_cfg_prt(baud)
}

pub fn send_cfg_ant(flags: u16, pins: u16) -> UbxFrame {
    frame(&CfgAnt { flags, pins })
}

pub fn send_cfg_msg(class_id: u8, msg_id: u8, rate: u8) -> UbxFrame {
    frame(&CfgMsg {
        msg_class: class_id,
        msg_id,
        rate,
    })
}

pub fn send_cfg_rate(rate_ms: u16) -> UbxFrame {
    frame(&CfgRate::at_rate_ms(rate_ms))
}

pub fn send_cfg_rst(cold: bool) -> UbxFrame {
    frame(&CfgRst::for_reset(cold))
}

pub fn send_cfg_pm2(flags: u32, update_period_ms: u32, search_period_ms: u32) -> UbxFrame {
    frame(&CfgPm2 {
        flags,
        update_period_ms,
        search_period_ms,
    })
}

pub fn send_cfg_sbas(enable: bool) -> UbxFrame {
    frame(&CfgSbas { enabled: enable })
}

pub fn send_cfg_nav5(config: &DriverConfig) -> UbxFrame {
    frame(&CfgNav5 {
        mask: 0x05, // dyn + fixMode
        dyn_model: config.dynamic_model,
        fix_mode: 3, // auto 2D/3D
        static_hold_thresh_cms: 0,
        static_hold_max_dist_m: 0,
        pos_acc_mask_m: 0,
    })
}

pub fn send_cfg_rxm(mode: u8) -> UbxFrame {
    frame(&CfgRxm {
        low_power_mode: mode,
    })
}

pub fn send_cfg_cfg(action: CfgCfgAction, mask: u32) -> UbxFrame {
    frame(&CfgCfg { action, mask })
}

pub fn send_aid_ini(ini: &AidIni) -> UbxFrame {
    frame(ini)
}

pub fn send_aid_alp_poll() -> UbxFrame {
    frame(&AidAlpPoll)
}
