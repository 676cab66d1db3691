//! Assistance subsystem (C10): AssistNow Offline (ALP) file storage and
//! the AID-ALPSRV wire protocol, plus the location hint degrade model.
//!
//! Grounded on `ubgps_internal.h`'s `struct gps_assistance_s` (`alp_file`,
//! `alp_file_id`, `alp_srv_addr`, `update_time`) and
//! `struct gps_assist_hint_s` (`have_location`, `longitude`/`latitude`,
//! `accuracy`, `altitude`, `location_time`), and the
//! `ubgps_check_alp_file_validity`/`ubgps_handle_aid_alpsrv` prototypes.
//! The original guards this state behind a single global mutex
//! (`g_aid_mutex`); here that's `std::sync::Mutex<AlpStore>` inside an
//! `Arc`, owned by the driver and clonable via `GpsDriver::alp_handle`
//! so an out-of-thread fetcher can swap the file concurrently.

pub mod alp;
pub mod alpsrv;
pub mod hint;

pub use alp::AlpStore;
pub use alpsrv::handle_alpsrv_request;
pub use hint::LocationHint;
