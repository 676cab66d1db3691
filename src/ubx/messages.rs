//! Typed payload encode/decode for the UBX messages required by spec.md §6.
//!
//! Field layouts follow the u-blox protocol specification; byte offsets are
//! called out in comments where they aren't obvious from the struct order.
//! Multi-byte fields are little-endian throughout.

use chrono::{DateTime, Datelike, Timelike, Utc};

use crate::error::{Error, Result};

/// Identifies a message's wire (class, id) pair.
pub trait UbxMessage: Sized {
    const CLASS: u8;
    const ID: u8;

    fn to_payload(&self) -> Vec<u8>;
    fn from_payload(payload: &[u8]) -> Result<Self>;
}

fn require_len(payload: &[u8], len: usize) -> Result<()> {
    if payload.len() != len {
        return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("expected payload of {len} bytes, got {}", payload.len()),
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------
// CFG-PRT (0x06, 0x00) — port configuration (UART variant only).
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CfgPrtUart {
    pub port_id: u8,
    pub tx_ready: u16,
    pub mode: u32,
    pub baud_rate: u32,
    pub in_proto_mask: u16,
    pub out_proto_mask: u16,
    pub flags: u16,
}

impl UbxMessage for CfgPrtUart {
    const CLASS: u8 = 0x06;
    const ID: u8 = 0x00;

    fn to_payload(&self) -> Vec<u8> {
        let mut p = Vec::with_capacity(20);
        p.push(self.port_id);
        p.push(0); // reserved0
        p.extend_from_slice(&self.tx_ready.to_le_bytes());
        p.extend_from_slice(&self.mode.to_le_bytes());
        p.extend_from_slice(&self.baud_rate.to_le_bytes());
        p.extend_from_slice(&self.in_proto_mask.to_le_bytes());
        p.extend_from_slice(&self.out_proto_mask.to_le_bytes());
        p.extend_from_slice(&self.flags.to_le_bytes());
        p.extend_from_slice(&[0, 0]); // reserved5
        p
    }

    fn from_payload(payload: &[u8]) -> Result<Self> {
        require_len(payload, 20)?;
        Ok(CfgPrtUart {
            port_id: payload[0],
            tx_ready: u16::from_le_bytes([payload[2], payload[3]]),
            mode: u32::from_le_bytes(payload[4..8].try_into().unwrap()),
            baud_rate: u32::from_le_bytes(payload[8..12].try_into().unwrap()),
            in_proto_mask: u16::from_le_bytes([payload[12], payload[13]]),
            out_proto_mask: u16::from_le_bytes([payload[14], payload[15]]),
            flags: u16::from_le_bytes([payload[16], payload[17]]),
        })
    }
}

/// `inProtoMask`/`outProtoMask` bit for the UBX protocol.
pub const PROTO_UBX: u16 = 0x01;
/// `inProtoMask` bit for NMEA (disabled during init).
pub const PROTO_NMEA: u16 = 0x02;
/// 8N1, no parity, extended tx timeout — matches the `mode` field used
/// throughout the corpus for an 8-bit/no-parity/1-stop-bit UART.
pub const UART_MODE_8N1: u32 = 0x000_08d0;

// ---------------------------------------------------------------------
// CFG-MSG (0x06, 0x01) — per-port message rate, current port only.
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CfgMsg {
    pub msg_class: u8,
    pub msg_id: u8,
    pub rate: u8,
}

impl UbxMessage for CfgMsg {
    const CLASS: u8 = 0x06;
    const ID: u8 = 0x01;

    fn to_payload(&self) -> Vec<u8> {
        vec![self.msg_class, self.msg_id, self.rate]
    }

    fn from_payload(payload: &[u8]) -> Result<Self> {
        require_len(payload, 3)?;
        Ok(CfgMsg {
            msg_class: payload[0],
            msg_id: payload[1],
            rate: payload[2],
        })
    }
}

// ---------------------------------------------------------------------
// CFG-RATE (0x06, 0x08) — navigation/measurement rate.
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CfgRate {
    pub meas_rate_ms: u16,
    pub nav_rate_cycles: u16,
    /// 0 = UTC, 1 = GPS time.
    pub time_ref: u16,
}

impl CfgRate {
    pub fn at_rate_ms(rate_ms: u16) -> Self {
        CfgRate {
            meas_rate_ms: rate_ms,
            nav_rate_cycles: 1,
            time_ref: 1,
        }
    }
}

impl UbxMessage for CfgRate {
    const CLASS: u8 = 0x06;
    const ID: u8 = 0x08;

    fn to_payload(&self) -> Vec<u8> {
        let mut p = Vec::with_capacity(6);
        p.extend_from_slice(&self.meas_rate_ms.to_le_bytes());
        p.extend_from_slice(&self.nav_rate_cycles.to_le_bytes());
        p.extend_from_slice(&self.time_ref.to_le_bytes());
        p
    }

    fn from_payload(payload: &[u8]) -> Result<Self> {
        require_len(payload, 6)?;
        Ok(CfgRate {
            meas_rate_ms: u16::from_le_bytes([payload[0], payload[1]]),
            nav_rate_cycles: u16::from_le_bytes([payload[2], payload[3]]),
            time_ref: u16::from_le_bytes([payload[4], payload[5]]),
        })
    }
}

// ---------------------------------------------------------------------
// CFG-RST (0x06, 0x04) — reset receiver.
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CfgRst {
    pub nav_bbr_mask: u16,
    pub reset_mode: u8,
}

impl CfgRst {
    /// `cold = true` clears the whole battery-backed RAM (ephemeris,
    /// almanac, position); `cold = false` is a hot start keeping it.
    pub fn for_reset(cold: bool) -> Self {
        CfgRst {
            nav_bbr_mask: if cold { 0xFFFF } else { 0x0000 },
            // Controlled GNSS-only restart: leaves the UART link up so the
            // driver doesn't need to reopen the transport after the reset.
            reset_mode: 0x02,
        }
    }
}

impl UbxMessage for CfgRst {
    const CLASS: u8 = 0x06;
    const ID: u8 = 0x04;

    fn to_payload(&self) -> Vec<u8> {
        let mut p = Vec::with_capacity(4);
        p.extend_from_slice(&self.nav_bbr_mask.to_le_bytes());
        p.push(self.reset_mode);
        p.push(0); // reserved1
        p
    }

    fn from_payload(payload: &[u8]) -> Result<Self> {
        require_len(payload, 4)?;
        Ok(CfgRst {
            nav_bbr_mask: u16::from_le_bytes([payload[0], payload[1]]),
            reset_mode: payload[2],
        })
    }
}

// ---------------------------------------------------------------------
// CFG-ANT (0x06, 0x13) — antenna configuration.
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CfgAnt {
    pub flags: u16,
    pub pins: u16,
}

impl UbxMessage for CfgAnt {
    const CLASS: u8 = 0x06;
    const ID: u8 = 0x13;

    fn to_payload(&self) -> Vec<u8> {
        let mut p = Vec::with_capacity(4);
        p.extend_from_slice(&self.flags.to_le_bytes());
        p.extend_from_slice(&self.pins.to_le_bytes());
        p
    }

    fn from_payload(payload: &[u8]) -> Result<Self> {
        require_len(payload, 4)?;
        Ok(CfgAnt {
            flags: u16::from_le_bytes([payload[0], payload[1]]),
            pins: u16::from_le_bytes([payload[2], payload[3]]),
        })
    }
}

// ---------------------------------------------------------------------
// CFG-SBAS (0x06, 0x16) — SBAS configuration.
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CfgSbas {
    pub enabled: bool,
}

impl UbxMessage for CfgSbas {
    const CLASS: u8 = 0x06;
    const ID: u8 = 0x16;

    fn to_payload(&self) -> Vec<u8> {
        let mode = if self.enabled { 0x01 } else { 0x00 };
        vec![mode, 0x07, 0x03, 0x00, 0x00, 0x00, 0x00, 0x00]
    }

    fn from_payload(payload: &[u8]) -> Result<Self> {
        require_len(payload, 8)?;
        Ok(CfgSbas {
            enabled: payload[0] & 0x01 != 0,
        })
    }
}

// ---------------------------------------------------------------------
// CFG-NAV5 (0x06, 0x24) — navigation engine settings.
// ---------------------------------------------------------------------

/// `dynModel` values from the u-blox protocol spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DynamicModel {
    Portable = 0,
    Stationary = 2,
    Pedestrian = 3,
    Automotive = 4,
    Sea = 5,
    Airborne1g = 6,
    Airborne2g = 7,
    Airborne4g = 8,
}

impl Default for DynamicModel {
    fn default() -> Self {
        // Matches NAV5_DYNAMIC_MODEL in the original driver header.
        DynamicModel::Automotive
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CfgNav5 {
    pub mask: u16,
    pub dyn_model: DynamicModel,
    pub fix_mode: u8,
    pub static_hold_thresh_cms: u8,
    pub static_hold_max_dist_m: u16,
    pub pos_acc_mask_m: u16,
}

impl UbxMessage for CfgNav5 {
    const CLASS: u8 = 0x06;
    const ID: u8 = 0x24;

    fn to_payload(&self) -> Vec<u8> {
        let mut p = vec![0u8; 36];
        p[0..2].copy_from_slice(&self.mask.to_le_bytes());
        p[2] = self.dyn_model as u8;
        p[3] = self.fix_mode;
        // fixedAlt (4), fixedAltVar (4), minElev (1), drLimit (1) left 0
        p[12..14].copy_from_slice(&0u16.to_le_bytes()); // pDop
        p[14..16].copy_from_slice(&0u16.to_le_bytes()); // tDop
        p[16..18].copy_from_slice(&self.pos_acc_mask_m.to_le_bytes());
        // tAcc (2) left 0
        p[20] = self.static_hold_thresh_cms;
        // dgnssTimeout (1), cnoThreshNumSVs (1), cnoThresh (1), reserved (2)
        p[26..28].copy_from_slice(&self.static_hold_max_dist_m.to_le_bytes());
        // utcStandard (1), reserved3 (5) left 0
        p
    }

    fn from_payload(payload: &[u8]) -> Result<Self> {
        require_len(payload, 36)?;
        let dyn_model = match payload[2] {
            0 => DynamicModel::Portable,
            2 => DynamicModel::Stationary,
            3 => DynamicModel::Pedestrian,
            4 => DynamicModel::Automotive,
            5 => DynamicModel::Sea,
            6 => DynamicModel::Airborne1g,
            7 => DynamicModel::Airborne2g,
            8 => DynamicModel::Airborne4g,
            _ => DynamicModel::Automotive,
        };
        Ok(CfgNav5 {
            mask: u16::from_le_bytes([payload[0], payload[1]]),
            dyn_model,
            fix_mode: payload[3],
            pos_acc_mask_m: u16::from_le_bytes([payload[16], payload[17]]),
            static_hold_thresh_cms: payload[20],
            static_hold_max_dist_m: u16::from_le_bytes([payload[26], payload[27]]),
        })
    }
}

// ---------------------------------------------------------------------
// CFG-RXM (0x06, 0x11) — receiver manager configuration.
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CfgRxm {
    pub low_power_mode: u8,
}

impl UbxMessage for CfgRxm {
    const CLASS: u8 = 0x06;
    const ID: u8 = 0x11;

    fn to_payload(&self) -> Vec<u8> {
        vec![8, self.low_power_mode] // reserved1 = 8 per protocol spec
    }

    fn from_payload(payload: &[u8]) -> Result<Self> {
        require_len(payload, 2)?;
        Ok(CfgRxm {
            low_power_mode: payload[1],
        })
    }
}

// ---------------------------------------------------------------------
// CFG-PM2 (0x06, 0x3B) — power management configuration.
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CfgPm2 {
    pub flags: u32,
    pub update_period_ms: u32,
    pub search_period_ms: u32,
}

impl UbxMessage for CfgPm2 {
    const CLASS: u8 = 0x06;
    const ID: u8 = 0x3B;

    fn to_payload(&self) -> Vec<u8> {
        let mut p = vec![0u8; 44];
        p[0] = 1; // version
        p[4..8].copy_from_slice(&self.flags.to_le_bytes());
        p[8..12].copy_from_slice(&self.update_period_ms.to_le_bytes());
        p[12..16].copy_from_slice(&self.search_period_ms.to_le_bytes());
        p
    }

    fn from_payload(payload: &[u8]) -> Result<Self> {
        require_len(payload, 44)?;
        Ok(CfgPm2 {
            flags: u32::from_le_bytes(payload[4..8].try_into().unwrap()),
            update_period_ms: u32::from_le_bytes(payload[8..12].try_into().unwrap()),
            search_period_ms: u32::from_le_bytes(payload[12..16].try_into().unwrap()),
        })
    }
}

// ---------------------------------------------------------------------
// CFG-CFG (0x06, 0x09) — clear/save/load configuration.
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CfgCfgAction {
    Clear,
    Save,
    Load,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CfgCfg {
    pub action: CfgCfgAction,
    pub mask: u32,
}

impl UbxMessage for CfgCfg {
    const CLASS: u8 = 0x06;
    const ID: u8 = 0x09;

    fn to_payload(&self) -> Vec<u8> {
        let mut p = vec![0u8; 12];
        let slice = match self.action {
            CfgCfgAction::Clear => &mut p[0..4],
            CfgCfgAction::Save => &mut p[4..8],
            CfgCfgAction::Load => &mut p[8..12],
        };
        slice.copy_from_slice(&self.mask.to_le_bytes());
        p
    }

    fn from_payload(payload: &[u8]) -> Result<Self> {
        require_len(payload, 12)?;
        let clear = u32::from_le_bytes(payload[0..4].try_into().unwrap());
        let save = u32::from_le_bytes(payload[4..8].try_into().unwrap());
        let load = u32::from_le_bytes(payload[8..12].try_into().unwrap());
        let (action, mask) = if clear != 0 {
            (CfgCfgAction::Clear, clear)
        } else if save != 0 {
            (CfgCfgAction::Save, save)
        } else {
            (CfgCfgAction::Load, load)
        };
        Ok(CfgCfg { action, mask })
    }
}

// ---------------------------------------------------------------------
// AID-INI (0x0B, 0x01) — aiding position/time/clock seed.
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AidIni {
    pub ecef_x_or_lat: i32,
    pub ecef_y_or_lon: i32,
    pub ecef_z_or_alt: i32,
    pub pos_accuracy: u32,
    pub time_cfg: u16,
    pub week_or_ym: u16,
    pub tow_or_hms: u32,
    pub tow_ns: i32,
    pub tm_accuracy_ms: u32,
    pub tm_accuracy_ns: u32,
    pub clk_drift_or_freq: i32,
    pub clk_drift_or_freq_accuracy: u32,
    pub flags: u32,
}

impl AidIni {
    /// Position valid (bit 0) and LLA-not-ECEF (bit 5).
    const FLAG_POS_VALID: u32 = 1 << 0;
    const FLAG_POS_IS_LLA: u32 = 1 << 5;
    /// Time valid (bit 1) and time-is-UTC (bit 10).
    const FLAG_TIME_VALID: u32 = 1 << 1;
    const FLAG_TIME_IS_UTC: u32 = 1 << 10;

    pub fn set_position_lla(&mut self, lat_1e7: i32, lon_1e7: i32, alt_mm: i32, accuracy_mm: u32) {
        self.ecef_x_or_lat = lat_1e7;
        self.ecef_y_or_lon = lon_1e7;
        self.ecef_z_or_alt = alt_mm / 10; // field unit is cm
        self.pos_accuracy = accuracy_mm / 10;
        self.flags |= Self::FLAG_POS_VALID | Self::FLAG_POS_IS_LLA;
    }

    pub fn set_time(&mut self, tm: DateTime<Utc>) {
        let year = tm.year() as u16;
        self.week_or_ym = (year - 2000) * 100 + (tm.month0() as u16);
        self.tow_or_hms = tm.hour() * 10_000 + tm.minute() * 100 + tm.second();
        self.tow_ns = tm.nanosecond() as i32;
        self.flags |= Self::FLAG_TIME_VALID | Self::FLAG_TIME_IS_UTC;
    }
}

impl UbxMessage for AidIni {
    const CLASS: u8 = 0x0B;
    const ID: u8 = 0x01;

    fn to_payload(&self) -> Vec<u8> {
        let mut p = Vec::with_capacity(48);
        p.extend_from_slice(&self.ecef_x_or_lat.to_le_bytes());
        p.extend_from_slice(&self.ecef_y_or_lon.to_le_bytes());
        p.extend_from_slice(&self.ecef_z_or_alt.to_le_bytes());
        p.extend_from_slice(&self.pos_accuracy.to_le_bytes());
        p.extend_from_slice(&self.time_cfg.to_le_bytes());
        p.extend_from_slice(&self.week_or_ym.to_le_bytes());
        p.extend_from_slice(&self.tow_or_hms.to_le_bytes());
        p.extend_from_slice(&self.tow_ns.to_le_bytes());
        p.extend_from_slice(&self.tm_accuracy_ms.to_le_bytes());
        p.extend_from_slice(&self.tm_accuracy_ns.to_le_bytes());
        p.extend_from_slice(&self.clk_drift_or_freq.to_le_bytes());
        p.extend_from_slice(&self.clk_drift_or_freq_accuracy.to_le_bytes());
        p.extend_from_slice(&self.flags.to_le_bytes());
        p
    }

    fn from_payload(payload: &[u8]) -> Result<Self> {
        require_len(payload, 48)?;
        Ok(AidIni {
            ecef_x_or_lat: i32::from_le_bytes(payload[0..4].try_into().unwrap()),
            ecef_y_or_lon: i32::from_le_bytes(payload[4..8].try_into().unwrap()),
            ecef_z_or_alt: i32::from_le_bytes(payload[8..12].try_into().unwrap()),
            pos_accuracy: u32::from_le_bytes(payload[12..16].try_into().unwrap()),
            time_cfg: u16::from_le_bytes([payload[16], payload[17]]),
            week_or_ym: u16::from_le_bytes([payload[18], payload[19]]),
            tow_or_hms: u32::from_le_bytes(payload[20..24].try_into().unwrap()),
            tow_ns: i32::from_le_bytes(payload[24..28].try_into().unwrap()),
            tm_accuracy_ms: u32::from_le_bytes(payload[28..32].try_into().unwrap()),
            tm_accuracy_ns: u32::from_le_bytes(payload[32..36].try_into().unwrap()),
            clk_drift_or_freq: i32::from_le_bytes(payload[36..40].try_into().unwrap()),
            clk_drift_or_freq_accuracy: u32::from_le_bytes(payload[40..44].try_into().unwrap()),
            flags: u32::from_le_bytes(payload[44..48].try_into().unwrap()),
        })
    }
}

// ---------------------------------------------------------------------
// AID-ALP poll (0x0B, 0x50) — zero-length poll for almanac status.
// ---------------------------------------------------------------------

pub struct AidAlpPoll;

impl UbxMessage for AidAlpPoll {
    const CLASS: u8 = 0x0B;
    const ID: u8 = 0x50;

    fn to_payload(&self) -> Vec<u8> {
        Vec::new()
    }

    fn from_payload(_payload: &[u8]) -> Result<Self> {
        Ok(AidAlpPoll)
    }
}

// ---------------------------------------------------------------------
// AID-ALPSRV (0x0B, 0x32) — almanac file read/write protocol.
// ---------------------------------------------------------------------

/// Wire header used both for the receiver's request and the driver's
/// reply. `offset`/`size` are counted in 16-bit words per the u-blox
/// ALPSRV protocol; callers convert to byte offsets with `* 2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlpSrv {
    pub id_size: u8,
    pub data_type: u8,
    pub offset: u16,
    pub size: u16,
    pub file_id: u16,
    pub data_size: u16,
    pub id1: u8,
    pub id2: u8,
    pub id3: u32,
}

impl UbxMessage for AlpSrv {
    const CLASS: u8 = 0x0B;
    const ID: u8 = 0x32;

    fn to_payload(&self) -> Vec<u8> {
        let mut p = Vec::with_capacity(16);
        p.push(self.id_size);
        p.push(self.data_type);
        p.extend_from_slice(&self.offset.to_le_bytes());
        p.extend_from_slice(&self.size.to_le_bytes());
        p.extend_from_slice(&self.file_id.to_le_bytes());
        p.extend_from_slice(&self.data_size.to_le_bytes());
        p.push(self.id1);
        p.push(self.id2);
        p.extend_from_slice(&self.id3.to_le_bytes());
        p
    }

    fn from_payload(payload: &[u8]) -> Result<Self> {
        if payload.len() < 16 {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "AID-ALPSRV header shorter than 16 bytes",
            )));
        }
        Ok(AlpSrv {
            id_size: payload[0],
            data_type: payload[1],
            offset: u16::from_le_bytes([payload[2], payload[3]]),
            size: u16::from_le_bytes([payload[4], payload[5]]),
            file_id: u16::from_le_bytes([payload[6], payload[7]]),
            data_size: u16::from_le_bytes([payload[8], payload[9]]),
            id1: payload[10],
            id2: payload[11],
            id3: u32::from_le_bytes(payload[12..16].try_into().unwrap()),
        })
    }
}

// ---------------------------------------------------------------------
// NAV-PVT (0x01, 0x07) — position/velocity/time solution.
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavPvt {
    pub itow: u32,
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub min: u8,
    pub sec: u8,
    pub valid: u8,
    pub time_accuracy_ns: u32,
    pub nanosecond: i32,
    pub fix_type: u8,
    pub flags: u8,
    pub num_satellites: u8,
    pub lon_1e7: i32,
    pub lat_1e7: i32,
    pub height_mm: i32,
    pub height_msl_mm: i32,
    pub horizontal_accuracy_mm: u32,
    pub vertical_accuracy_mm: u32,
    pub speed_accuracy_mm_s: u32,
}

impl NavPvt {
    /// `fixType` values 3 (3D) and 4 (GNSS+dead reckoning) both count as an
    /// acquired fix for the state machine.
    pub fn has_3d_fix(&self) -> bool {
        self.fix_type == 3 || self.fix_type == 4
    }
}

impl UbxMessage for NavPvt {
    const CLASS: u8 = 0x01;
    const ID: u8 = 0x07;

    fn to_payload(&self) -> Vec<u8> {
        let mut p = vec![0u8; 84];
        p[0..4].copy_from_slice(&self.itow.to_le_bytes());
        p[4..6].copy_from_slice(&self.year.to_le_bytes());
        p[6] = self.month;
        p[7] = self.day;
        p[8] = self.hour;
        p[9] = self.min;
        p[10] = self.sec;
        p[11] = self.valid;
        p[12..16].copy_from_slice(&self.time_accuracy_ns.to_le_bytes());
        p[16..20].copy_from_slice(&self.nanosecond.to_le_bytes());
        p[20] = self.fix_type;
        p[21] = self.flags;
        p[23] = self.num_satellites;
        p[24..28].copy_from_slice(&self.lon_1e7.to_le_bytes());
        p[28..32].copy_from_slice(&self.lat_1e7.to_le_bytes());
        p[32..36].copy_from_slice(&self.height_mm.to_le_bytes());
        p[36..40].copy_from_slice(&self.height_msl_mm.to_le_bytes());
        p[40..44].copy_from_slice(&self.horizontal_accuracy_mm.to_le_bytes());
        p[44..48].copy_from_slice(&self.vertical_accuracy_mm.to_le_bytes());
        p[68..72].copy_from_slice(&self.speed_accuracy_mm_s.to_le_bytes());
        p
    }

    fn from_payload(payload: &[u8]) -> Result<Self> {
        require_len(payload, 84)?;
        Ok(NavPvt {
            itow: u32::from_le_bytes(payload[0..4].try_into().unwrap()),
            year: u16::from_le_bytes([payload[4], payload[5]]),
            month: payload[6],
            day: payload[7],
            hour: payload[8],
            min: payload[9],
            sec: payload[10],
            valid: payload[11],
            time_accuracy_ns: u32::from_le_bytes(payload[12..16].try_into().unwrap()),
            nanosecond: i32::from_le_bytes(payload[16..20].try_into().unwrap()),
            fix_type: payload[20],
            flags: payload[21],
            num_satellites: payload[23],
            lon_1e7: i32::from_le_bytes(payload[24..28].try_into().unwrap()),
            lat_1e7: i32::from_le_bytes(payload[28..32].try_into().unwrap()),
            height_mm: i32::from_le_bytes(payload[32..36].try_into().unwrap()),
            height_msl_mm: i32::from_le_bytes(payload[36..40].try_into().unwrap()),
            horizontal_accuracy_mm: u32::from_le_bytes(payload[40..44].try_into().unwrap()),
            vertical_accuracy_mm: u32::from_le_bytes(payload[44..48].try_into().unwrap()),
            speed_accuracy_mm_s: u32::from_le_bytes(payload[68..72].try_into().unwrap()),
        })
    }
}

// ---------------------------------------------------------------------
// ACK-ACK / ACK-NAK (0x05, 0x01 / 0x05, 0x00).
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AckAck {
    pub class: u8,
    pub id: u8,
}

impl UbxMessage for AckAck {
    const CLASS: u8 = 0x05;
    const ID: u8 = 0x01;

    fn to_payload(&self) -> Vec<u8> {
        vec![self.class, self.id]
    }

    fn from_payload(payload: &[u8]) -> Result<Self> {
        require_len(payload, 2)?;
        Ok(AckAck {
            class: payload[0],
            id: payload[1],
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AckNak {
    pub class: u8,
    pub id: u8,
}

impl UbxMessage for AckNak {
    const CLASS: u8 = 0x05;
    const ID: u8 = 0x00;

    fn to_payload(&self) -> Vec<u8> {
        vec![self.class, self.id]
    }

    fn from_payload(payload: &[u8]) -> Result<Self> {
        require_len(payload, 2)?;
        Ok(AckNak {
            class: payload[0],
            id: payload[1],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cfg_prt_round_trip() {
        let msg = CfgPrtUart {
            port_id: 1,
            tx_ready: 0,
            mode: UART_MODE_8N1,
            baud_rate: 9600,
            in_proto_mask: PROTO_UBX,
            out_proto_mask: PROTO_UBX,
            flags: 0,
        };
        let payload = msg.to_payload();
        assert_eq!(payload.len(), 20);
        let decoded = CfgPrtUart::from_payload(&payload).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn cfg_rate_default_is_1hz_gps_time() {
        let rate = CfgRate::at_rate_ms(1000);
        assert_eq!(rate.nav_rate_cycles, 1);
        assert_eq!(rate.time_ref, 1);
    }

    #[test]
    fn cfg_rst_cold_clears_bbr() {
        let rst = CfgRst::for_reset(true);
        assert_eq!(rst.nav_bbr_mask, 0xFFFF);
        let rst = CfgRst::for_reset(false);
        assert_eq!(rst.nav_bbr_mask, 0x0000);
    }

    #[test]
    fn aid_ini_set_position_scales_units() {
        let mut ini = AidIni::default();
        ini.set_position_lla(601_700_000, 249_400_000, 50_000, 1_000_000);
        assert_eq!(ini.ecef_x_or_lat, 601_700_000);
        assert_eq!(ini.ecef_z_or_alt, 5_000); // 50000mm -> 5000cm
        assert_ne!(ini.flags & (AidIni::FLAG_POS_VALID | AidIni::FLAG_POS_IS_LLA), 0);
    }

    #[test]
    fn aid_ini_round_trips_through_payload() {
        let mut ini = AidIni::default();
        ini.set_position_lla(601_700_000, 249_400_000, 50_000, 1_000_000);
        ini.set_time(Utc::now());
        let payload = ini.to_payload();
        assert_eq!(payload.len(), 48);
        let decoded = AidIni::from_payload(&payload).unwrap();
        assert_eq!(decoded, ini);
    }

    #[test]
    fn alpsrv_round_trips_through_payload() {
        let req = AlpSrv {
            id_size: 4,
            data_type: 0xff,
            offset: 512,
            size: 256,
            file_id: 42,
            data_size: 0,
            id1: 1,
            id2: 2,
            id3: 0xdead_beef,
        };
        let payload = req.to_payload();
        assert_eq!(payload.len(), 16);
        let decoded = AlpSrv::from_payload(&payload).unwrap();
        assert_eq!(decoded, req);
    }

    #[test]
    fn nav_pvt_3d_fix_detection() {
        let mut pvt_payload = vec![0u8; 84];
        pvt_payload[20] = 3;
        let pvt = NavPvt::from_payload(&pvt_payload).unwrap();
        assert!(pvt.has_3d_fix());
        pvt_payload[20] = 2;
        let pvt = NavPvt::from_payload(&pvt_payload).unwrap();
        assert!(!pvt.has_3d_fix());
    }

    #[test]
    fn ack_ack_and_nak_share_payload_shape_but_differ_in_id() {
        assert_eq!(AckAck::CLASS, AckNak::CLASS);
        assert_ne!(AckAck::ID, AckNak::ID);
    }
}
