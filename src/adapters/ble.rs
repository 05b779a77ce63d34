//! BLE command link adapter.
//!
//! Implements [`LinkPort`] — the outbound half of the command link.  The
//! inbound half never reaches this struct: GATTS callbacks push
//! [`LinkEvent`]s straight into [`LINK_EVENTS`](crate::events::LINK_EVENTS)
//! and the main loop drains them.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: Bluedroid BLE GATT server via raw `esp_idf_svc::sys`.
//! - **all other targets**: simulation stubs for host-side tests.
//!
//! ## GATT Service Layout
//!
//! | Characteristic | UUID                                     | Perms       |
//! |----------------|------------------------------------------|-------------|
//! | (service)      | `4fafc201-1fb5-459e-8fcc-c5c9c331914b`   |             |
//! | Command        | `beb5483e-36e1-4688-b7f5-ea07361b26a8`   | Write       |
//! | Status         | `d06b9f92-2b3d-4f6c-9b3f-2e7a1a5b4f9c`   | Read+Notify |

use core::fmt;
use log::{info, warn};

use crate::app::ports::LinkPort;

#[cfg(target_os = "espidf")]
use crate::events::{LINK_EVENTS, LinkEvent, MAX_COMMAND_LEN};

// ───────────────────────────────────────────────────────────────
// Constants
// ───────────────────────────────────────────────────────────────

pub const SERVICE_UUID: u128 = 0x4faf_c201_1fb5_459e_8fcc_c5c9_c331_914b;
pub const CHAR_COMMAND: u128 = 0xbeb5_483e_36e1_4688_b7f5_ea07_361b_26a8;
pub const CHAR_STATUS: u128 = 0xd06b_9f92_2b3d_4f6c_9b3f_2e7a_1a5b_4f9c;

/// Requested connection parameters (1.25 ms / 10 ms units).
pub const CONN_MIN_INTERVAL: u16 = 24;
pub const CONN_MAX_INTERVAL: u16 = 40;
pub const CONN_LATENCY: u16 = 0;
pub const CONN_SUPERVISION_TIMEOUT: u16 = 1000;

/// ATT MTU before the central negotiates a larger one.
pub const DEFAULT_MTU: u16 = 23;

/// Usable notification payload for a given ATT MTU.
pub fn notify_capacity(mtu: u16) -> usize {
    usize::from(mtu.max(DEFAULT_MTU)) - 3
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BleError {
    /// A controller / Bluedroid init step failed; carries the ESP error code.
    StackInitFailed(i32),
}

impl fmt::Display for BleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StackInitFailed(code) => write!(f, "BLE stack initialisation failed ({})", code),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// BLE state
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BleState {
    Idle,
    Advertising,
    Connected,
    Failed,
}

// ── ESP-IDF BLE static state (callback-safe atomics) ─────────
//
// Bluedroid callbacks are C function pointers that cannot capture Rust
// closures. These atomics bridge the callback context to the adapter.

#[cfg(target_os = "espidf")]
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering as AtomicOrdering};

#[cfg(target_os = "espidf")]
static BLE_GATTS_IF: AtomicU32 = AtomicU32::new(0);
#[cfg(target_os = "espidf")]
static BLE_CONN_ID: AtomicU32 = AtomicU32::new(0);
#[cfg(target_os = "espidf")]
static BLE_CONNECTED: AtomicBool = AtomicBool::new(false);
#[cfg(target_os = "espidf")]
static BLE_MTU: AtomicU32 = AtomicU32::new(DEFAULT_MTU as u32);
#[cfg(target_os = "espidf")]
static BLE_SVC_HANDLE: AtomicU32 = AtomicU32::new(0);
#[cfg(target_os = "espidf")]
static BLE_CMD_CHAR_HANDLE: AtomicU32 = AtomicU32::new(0);
#[cfg(target_os = "espidf")]
static BLE_STATUS_CHAR_HANDLE: AtomicU32 = AtomicU32::new(0);
#[cfg(target_os = "espidf")]
static BLE_CHAR_STEP: AtomicU32 = AtomicU32::new(0);

/// Client Characteristic Configuration descriptor.
#[cfg(target_os = "espidf")]
const CCCD_UUID: u16 = 0x2902;

#[cfg(target_os = "espidf")]
fn uuid128_to_esp(uuid: u128) -> esp_idf_svc::sys::esp_bt_uuid_t {
    let mut t: esp_idf_svc::sys::esp_bt_uuid_t = unsafe { core::mem::zeroed() };
    t.len = 16;
    unsafe {
        t.uuid.uuid128 = uuid.to_le_bytes();
    }
    t
}

#[cfg(target_os = "espidf")]
fn uuid16_to_esp(uuid: u16) -> esp_idf_svc::sys::esp_bt_uuid_t {
    let mut t: esp_idf_svc::sys::esp_bt_uuid_t = unsafe { core::mem::zeroed() };
    t.len = 2;
    t.uuid.uuid16 = uuid;
    t
}

#[cfg(target_os = "espidf")]
unsafe fn add_gatt_char(svc_handle: u16, uuid: u128, perm: u32, prop: u32) {
    use esp_idf_svc::sys::*;
    let mut char_uuid = uuid128_to_esp(uuid);
    unsafe {
        esp_ble_gatts_add_char(
            svc_handle,
            &mut char_uuid,
            perm as esp_gatt_perm_t,
            prop as esp_gatt_char_prop_t,
            core::ptr::null_mut(),
            core::ptr::null_mut(),
        );
    }
}

#[cfg(target_os = "espidf")]
unsafe fn start_advertising() {
    use esp_idf_svc::sys::*;
    let mut adv_params = esp_ble_adv_params_t {
        adv_int_min: 0x20,
        adv_int_max: 0x40,
        adv_type: esp_ble_adv_type_t_ADV_TYPE_IND,
        own_addr_type: esp_ble_addr_type_t_BLE_ADDR_TYPE_PUBLIC,
        channel_map: esp_ble_adv_channel_t_ADV_CHNL_ALL,
        adv_filter_policy: esp_ble_adv_filter_t_ADV_FILTER_ALLOW_SCAN_ANY_CON_ANY,
        ..unsafe { core::mem::zeroed() }
    };
    unsafe {
        esp_ble_gap_start_advertising(&mut adv_params);
    }
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn ble_gap_event_handler(
    event: esp_idf_svc::sys::esp_gap_ble_cb_event_t,
    param: *mut esp_idf_svc::sys::esp_ble_gap_cb_param_t,
) {
    use esp_idf_svc::sys::*;
    match event {
        esp_gap_ble_cb_event_t_ESP_GAP_BLE_ADV_DATA_SET_COMPLETE_EVT => unsafe {
            start_advertising();
        },
        esp_gap_ble_cb_event_t_ESP_GAP_BLE_ADV_START_COMPLETE_EVT => {
            log::info!("BLE GAP: advertising started");
        }
        esp_gap_ble_cb_event_t_ESP_GAP_BLE_UPDATE_CONN_PARAMS_EVT => {
            let p = unsafe { &(*param).update_conn_params };
            log::info!(
                "BLE GAP: conn params int={} latency={} timeout={}",
                p.conn_int,
                p.latency,
                p.timeout
            );
        }
        _ => {}
    }
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn ble_gatts_event_handler(
    event: esp_idf_svc::sys::esp_gatts_cb_event_t,
    gatts_if: esp_idf_svc::sys::esp_gatt_if_t,
    param: *mut esp_idf_svc::sys::esp_ble_gatts_cb_param_t,
) {
    use esp_idf_svc::sys::*;

    BLE_GATTS_IF.store(gatts_if as u32, AtomicOrdering::Relaxed);

    match event {
        esp_gatts_cb_event_t_ESP_GATTS_REG_EVT => {
            log::info!("BLE GATTS: app registered (if={})", gatts_if);
            let svc_uuid = uuid128_to_esp(SERVICE_UUID);
            let mut svc_id = esp_gatt_srvc_id_t {
                id: esp_gatt_id_t {
                    uuid: svc_uuid,
                    inst_id: 0,
                },
                is_primary: true,
            };
            unsafe {
                esp_ble_gatts_create_service(gatts_if, &mut svc_id, 8);
            }
        }
        esp_gatts_cb_event_t_ESP_GATTS_CREATE_EVT => {
            let p = unsafe { &(*param).create };
            let svc_handle = p.service_handle;
            BLE_SVC_HANDLE.store(svc_handle as u32, AtomicOrdering::Relaxed);
            log::info!("BLE GATTS: service created (handle={})", svc_handle);
            BLE_CHAR_STEP.store(1, AtomicOrdering::Relaxed);
            unsafe {
                esp_ble_gatts_start_service(svc_handle);
                add_gatt_char(
                    svc_handle,
                    CHAR_COMMAND,
                    ESP_GATT_PERM_WRITE,
                    ESP_GATT_CHAR_PROP_BIT_WRITE,
                );
            }
        }
        esp_gatts_cb_event_t_ESP_GATTS_ADD_CHAR_EVT => {
            let p = unsafe { &(*param).add_char };
            let handle = p.attr_handle;
            let svc_handle = BLE_SVC_HANDLE.load(AtomicOrdering::Relaxed) as u16;
            match BLE_CHAR_STEP.load(AtomicOrdering::Relaxed) {
                1 => {
                    BLE_CMD_CHAR_HANDLE.store(handle as u32, AtomicOrdering::Relaxed);
                    log::info!("BLE GATTS: command char (handle={})", handle);
                    BLE_CHAR_STEP.store(2, AtomicOrdering::Relaxed);
                    unsafe {
                        add_gatt_char(
                            svc_handle,
                            CHAR_STATUS,
                            ESP_GATT_PERM_READ,
                            ESP_GATT_CHAR_PROP_BIT_READ | ESP_GATT_CHAR_PROP_BIT_NOTIFY,
                        );
                    }
                }
                2 => {
                    BLE_STATUS_CHAR_HANDLE.store(handle as u32, AtomicOrdering::Relaxed);
                    log::info!("BLE GATTS: status char (handle={})", handle);
                    BLE_CHAR_STEP.store(3, AtomicOrdering::Relaxed);
                    let mut cccd = uuid16_to_esp(CCCD_UUID);
                    unsafe {
                        esp_ble_gatts_add_char_descr(
                            svc_handle,
                            &mut cccd,
                            (ESP_GATT_PERM_READ | ESP_GATT_PERM_WRITE) as esp_gatt_perm_t,
                            core::ptr::null_mut(),
                            core::ptr::null_mut(),
                        );
                    }
                }
                _ => {}
            }
        }
        esp_gatts_cb_event_t_ESP_GATTS_ADD_CHAR_DESCR_EVT => {
            BLE_CHAR_STEP.store(4, AtomicOrdering::Relaxed);
            log::info!("BLE GATTS: status CCCD added — all registered");
        }
        esp_gatts_cb_event_t_ESP_GATTS_CONNECT_EVT => {
            let p = unsafe { &(*param).connect };
            BLE_CONN_ID.store(p.conn_id as u32, AtomicOrdering::Relaxed);
            BLE_CONNECTED.store(true, AtomicOrdering::Release);
            BLE_MTU.store(DEFAULT_MTU as u32, AtomicOrdering::Relaxed);
            log::info!("BLE GATTS: client connected (conn_id={})", p.conn_id);

            let mut conn_params = esp_ble_conn_update_params_t {
                bda: p.remote_bda,
                min_int: CONN_MIN_INTERVAL,
                max_int: CONN_MAX_INTERVAL,
                latency: CONN_LATENCY,
                timeout: CONN_SUPERVISION_TIMEOUT,
            };
            unsafe {
                esp_ble_gap_update_conn_params(&mut conn_params);
            }
            LINK_EVENTS.push(LinkEvent::Connected);
        }
        esp_gatts_cb_event_t_ESP_GATTS_DISCONNECT_EVT => {
            BLE_CONNECTED.store(false, AtomicOrdering::Release);
            log::info!("BLE GATTS: client disconnected");
            LINK_EVENTS.push(LinkEvent::Disconnected);
            unsafe {
                start_advertising();
            }
        }
        esp_gatts_cb_event_t_ESP_GATTS_MTU_EVT => {
            let p = unsafe { &(*param).mtu };
            BLE_MTU.store(u32::from(p.mtu), AtomicOrdering::Relaxed);
            log::info!("BLE GATTS: MTU {}", p.mtu);
        }
        esp_gatts_cb_event_t_ESP_GATTS_WRITE_EVT => {
            let p = unsafe { &(*param).write };
            let data = unsafe { core::slice::from_raw_parts(p.value, p.len as usize) };

            if u32::from(p.handle) == BLE_CMD_CHAR_HANDLE.load(AtomicOrdering::Relaxed) {
                match LinkEvent::command(data) {
                    Some(event) => {
                        LINK_EVENTS.push(event);
                    }
                    None => log::warn!(
                        "BLE GATTS: command of {} bytes exceeds {}, dropped",
                        data.len(),
                        MAX_COMMAND_LEN
                    ),
                }
            }
            if p.need_rsp {
                unsafe {
                    esp_ble_gatts_send_response(
                        gatts_if,
                        p.conn_id,
                        p.trans_id,
                        esp_gatt_status_t_ESP_GATT_OK,
                        core::ptr::null_mut(),
                    );
                }
            }
        }
        _ => {}
    }
}

// ───────────────────────────────────────────────────────────────
// BLE adapter
// ───────────────────────────────────────────────────────────────

pub struct BleAdapter {
    state: BleState,
    device_name: heapless::String<24>,
    /// Simulation: payloads that would have been notified.
    #[cfg(not(target_os = "espidf"))]
    sim_sent: Vec<Vec<u8>>,
    /// Simulation: negotiated MTU.
    #[cfg(not(target_os = "espidf"))]
    sim_mtu: u16,
}

impl BleAdapter {
    pub fn new(device_name: heapless::String<24>) -> Self {
        Self {
            state: BleState::Idle,
            device_name,
            #[cfg(not(target_os = "espidf"))]
            sim_sent: Vec::new(),
            #[cfg(not(target_os = "espidf"))]
            sim_mtu: DEFAULT_MTU,
        }
    }

    pub fn state(&self) -> BleState {
        self.state
    }

    /// Bring up the stack and start advertising.
    pub fn start(&mut self) -> Result<(), BleError> {
        info!("BLE: starting advertising as '{}'", self.device_name);
        match self.platform_start() {
            Ok(()) => {
                self.state = BleState::Advertising;
                Ok(())
            }
            Err(e) => {
                self.state = BleState::Failed;
                Err(e)
            }
        }
    }

    /// Mirror of the callback-side connection flag, driven by the main
    /// loop as it drains `LinkEvent::Connected`.
    pub fn on_central_connected(&mut self) {
        if self.state != BleState::Failed {
            self.state = BleState::Connected;
        }
    }

    pub fn on_central_disconnected(&mut self) {
        if self.state == BleState::Connected {
            self.state = BleState::Advertising;
        }
        #[cfg(not(target_os = "espidf"))]
        {
            self.sim_mtu = DEFAULT_MTU;
        }
    }

    /// Simulation: the central negotiated a larger MTU.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_set_mtu(&mut self, mtu: u16) {
        self.sim_mtu = mtu;
    }

    /// Simulation: everything notified so far.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_sent(&self) -> &[Vec<u8>] {
        &self.sim_sent
    }

    fn mtu(&self) -> u16 {
        #[cfg(target_os = "espidf")]
        {
            BLE_MTU.load(AtomicOrdering::Relaxed) as u16
        }
        #[cfg(not(target_os = "espidf"))]
        {
            self.sim_mtu
        }
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_start(&mut self) -> Result<(), BleError> {
        use esp_idf_svc::sys::*;
        unsafe {
            // Release classic BT memory (BLE-only mode saves ~30 KB).
            esp_bt_controller_mem_release(esp_bt_mode_t_ESP_BT_MODE_CLASSIC_BT);

            let mut bt_cfg = esp_bt_controller_config_t::default();
            let ret = esp_bt_controller_init(&mut bt_cfg);
            if ret != ESP_OK as i32 {
                return Err(BleError::StackInitFailed(ret));
            }
            let ret = esp_bt_controller_enable(esp_bt_mode_t_ESP_BT_MODE_BLE);
            if ret != ESP_OK as i32 {
                return Err(BleError::StackInitFailed(ret));
            }
            let ret = esp_bluedroid_init();
            if ret != ESP_OK as i32 {
                return Err(BleError::StackInitFailed(ret));
            }
            let ret = esp_bluedroid_enable();
            if ret != ESP_OK as i32 {
                return Err(BleError::StackInitFailed(ret));
            }

            esp_ble_gap_register_callback(Some(ble_gap_event_handler));
            esp_ble_gatts_register_callback(Some(ble_gatts_event_handler));
            esp_ble_gatts_app_register(0);
            esp_ble_gatt_set_local_mtu(517);

            let mut name = [0u8; 25];
            let bytes = self.device_name.as_bytes();
            name[..bytes.len()].copy_from_slice(bytes);
            esp_ble_gap_set_device_name(name.as_ptr() as *const _);

            // Advertise name + service UUID; advertising starts once the
            // stack confirms the data (ADV_DATA_SET_COMPLETE).
            let mut service_uuid = SERVICE_UUID.to_le_bytes();
            let mut adv_data = esp_ble_adv_data_t {
                set_scan_rsp: false,
                include_name: true,
                include_txpower: false,
                min_interval: 0x0006,
                max_interval: 0x0010,
                appearance: 0,
                service_uuid_len: service_uuid.len() as u16,
                p_service_uuid: service_uuid.as_mut_ptr(),
                flag: (ESP_BLE_ADV_FLAG_GEN_DISC | ESP_BLE_ADV_FLAG_BREDR_NOT_SPT) as u8,
                ..core::mem::zeroed()
            };
            let ret = esp_ble_gap_config_adv_data(&mut adv_data);
            if ret != ESP_OK as i32 {
                warn!("BLE: adv data rejected ({}), advertising without it", ret);
                start_advertising();
            }
        }
        info!(
            "BLE(espidf): Bluedroid stack initialized, advertising as '{}'",
            self.device_name
        );
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_start(&mut self) -> Result<(), BleError> {
        info!(
            "BLE(sim): advertising '{}' (service {:032x})",
            self.device_name, SERVICE_UUID
        );
        Ok(())
    }

    /// Set the status attribute value (for reads) and notify it.
    #[cfg(target_os = "espidf")]
    fn platform_notify(&mut self, payload: &[u8]) {
        use esp_idf_svc::sys::*;
        let handle = BLE_STATUS_CHAR_HANDLE.load(AtomicOrdering::Relaxed) as u16;
        if handle == 0 {
            return;
        }
        unsafe {
            esp_ble_gatts_set_attr_value(handle, payload.len() as u16, payload.as_ptr());
            esp_ble_gatts_send_indicate(
                BLE_GATTS_IF.load(AtomicOrdering::Relaxed) as esp_gatt_if_t,
                BLE_CONN_ID.load(AtomicOrdering::Relaxed) as u16,
                handle,
                payload.len() as u16,
                payload.as_ptr() as *mut u8,
                false,
            );
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_notify(&mut self, payload: &[u8]) {
        self.sim_sent.push(payload.to_vec());
    }
}

// ───────────────────────────────────────────────────────────────
// LinkPort implementation
// ───────────────────────────────────────────────────────────────

impl LinkPort for BleAdapter {
    fn is_connected(&self) -> bool {
        #[cfg(target_os = "espidf")]
        {
            BLE_CONNECTED.load(AtomicOrdering::Acquire)
        }
        #[cfg(not(target_os = "espidf"))]
        {
            self.state == BleState::Connected
        }
    }

    fn notify(&mut self, payload: &[u8]) {
        let cap = notify_capacity(self.mtu());
        let sent = if payload.len() > cap {
            warn!(
                "BLE: notification truncated ({} > {} bytes)",
                payload.len(),
                cap
            );
            &payload[..cap]
        } else {
            payload
        };
        self.platform_notify(sent);
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
