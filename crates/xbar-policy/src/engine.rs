//! Device state policy engine
//!
//! Folds device state (screen, charger, tethering, power save, wifi,
//! automotive projection) into the policy a modem runs under: which
//! unsolicited indications stay enabled, how often cell info may be
//! reported, and whether the modem may batch work because nobody is
//! looking at the device.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info};
use xbar_fanout::{Fanout, SubscriberId};
use xbar_ril::{AccessNetwork, DeviceStateKind, IndicationFilter, ModemRequest};

/// Minimum spacing of cell info reports while someone is looking (ms)
pub const CELL_INFO_INTERVAL_SHORT_MS: u32 = 2_000;

/// Minimum spacing of cell info reports while the device idles (ms)
pub const CELL_INFO_INTERVAL_LONG_MS: u32 = 10_000;

/// Hysteresis thresholds for downlink capacity estimate reports
const DOWNLINK_THRESHOLDS_KBPS: [u32; 14] = [
    100, 500, 1_000, 5_000, 10_000, 20_000, 50_000, 75_000, 100_000, 200_000, 500_000, 1_000_000,
    1_500_000, 2_000_000,
];

/// Hysteresis thresholds for uplink capacity estimate reports
const UPLINK_THRESHOLDS_KBPS: [u32; 11] = [
    100, 500, 1_000, 5_000, 10_000, 20_000, 50_000, 75_000, 100_000, 200_000, 500_000,
];

/// How aggressively 5G state is tracked while the device idles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NrTrackingMode {
    /// No extra tracking beyond the high-power rules
    Off,
    /// Track network state while an NR connection is live
    Extended,
    /// Always track network state
    AlwaysOn,
}

/// Seed values for the policy inputs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    pub charging: bool,
    pub screen_on: bool,
    pub power_save: bool,
    pub tethering: bool,
    pub wifi_connected: bool,
    pub automotive_projection: bool,
    pub always_report_signal_strength: bool,
    pub radio_on: bool,
    pub nr_tracking: NrTrackingMode,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            charging: false,
            screen_on: true,
            power_save: false,
            tethering: false,
            wifi_connected: false,
            automotive_projection: false,
            always_report_signal_strength: false,
            radio_on: false,
            nr_tracking: NrTrackingMode::Off,
        }
    }
}

/// A device state transition fed into the policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceStateEvent {
    /// The modem interface layer (re)connected
    RilConnected,
    /// The radio became reachable
    RadioAvailable,
    /// The radio powered on
    RadioOn,
    /// The radio powered off or became unreachable
    RadioOffOrUnavailable,
    ScreenChanged(bool),
    ChargingChanged(bool),
    PowerSaveChanged(bool),
    TetheringChanged(bool),
    WifiChanged(bool),
    AutomotiveProjectionChanged(bool),
    AlwaysReportSignalStrengthChanged(bool),
}

/// Events the policy emits for upstream consumers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyEvent {
    /// The device crossed between high-power use and idle. Carries
    /// the new value.
    HighPowerChanged(bool),
}

/// The device state policy engine.
///
/// Call [`update`](Self::update) with each state transition, then
/// drain the buffered [`ModemRequest`]s toward the modem and the
/// [`PolicyEvent`]s toward whoever tracks device idle state.
pub struct DeviceStatePolicy {
    charging: bool,
    screen_on: bool,
    power_save: bool,
    tethering: bool,
    wifi_connected: bool,
    automotive_projection: bool,
    always_report_signal_strength: bool,
    radio_on: bool,
    nr_tracking: NrTrackingMode,
    nr_connected: bool,

    /// Filter last pushed to the modem. Starts wide open; the modem
    /// reports everything until told otherwise.
    filter: IndicationFilter,
    cell_info_min_interval_ms: u32,
    low_data_expected: bool,

    physical_channel_watch: Fanout<bool>,
    request_buffer: Vec<ModemRequest>,
    event_buffer: Vec<PolicyEvent>,
}

impl DeviceStatePolicy {
    /// Create a policy engine with default seed state
    pub fn new() -> Self {
        Self::with_config(PolicyConfig::default())
    }

    /// Create with specific seed state
    pub fn with_config(config: PolicyConfig) -> Self {
        Self {
            charging: config.charging,
            screen_on: config.screen_on,
            power_save: config.power_save,
            tethering: config.tethering,
            wifi_connected: config.wifi_connected,
            automotive_projection: config.automotive_projection,
            always_report_signal_strength: config.always_report_signal_strength,
            radio_on: config.radio_on,
            nr_tracking: config.nr_tracking,
            nr_connected: false,
            filter: IndicationFilter::ALL,
            cell_info_min_interval_ms: CELL_INFO_INTERVAL_SHORT_MS,
            low_data_expected: false,
            physical_channel_watch: Fanout::new(),
            request_buffer: Vec::new(),
            event_buffer: Vec::new(),
        }
    }

    /// The filter last pushed to the modem
    pub fn filter(&self) -> IndicationFilter {
        self.filter
    }

    /// Minimum cell info reporting interval currently in effect (ms)
    pub fn cell_info_min_interval_ms(&self) -> u32 {
        self.cell_info_min_interval_ms
    }

    /// Whether the modem has been told to expect little data traffic
    pub fn low_data_expected(&self) -> bool {
        self.low_data_expected
    }

    /// The device is actively burning power on someone's behalf:
    /// charging, lit screen, tethering, or a car display, with the
    /// radio up. Everything else counts as idle.
    pub fn is_high_power(&self) -> bool {
        (self.charging || self.screen_on || self.tethering || self.automotive_projection)
            && self.radio_on
    }

    /// Change the 5G tracking mode. Read the next time the filter is
    /// recomputed; does not itself push anything.
    pub fn set_nr_tracking(&mut self, mode: NrTrackingMode) {
        self.nr_tracking = mode;
    }

    /// Record whether an NR connection is live. Read lazily, like the
    /// tracking mode.
    pub fn set_nr_connected(&mut self, connected: bool) {
        self.nr_connected = connected;
    }

    /// Subscribe to deltas of the physical channel config filter bit
    pub fn watch_physical_channel(&mut self, id: SubscriberId, tx: UnboundedSender<bool>) {
        self.physical_channel_watch.subscribe(id, tx);
    }

    /// Drop a physical channel subscription
    pub fn unwatch_physical_channel(&mut self, id: SubscriberId) -> bool {
        self.physical_channel_watch.unsubscribe(id)
    }

    /// Apply one device state transition.
    ///
    /// An event that does not change its input is dropped without
    /// recomputing anything. `RilConnected` and `RadioAvailable`
    /// instead push the full current policy, because the modem on the
    /// other end may have rebooted and lost it.
    pub fn update(&mut self, event: DeviceStateEvent) {
        if matches!(
            event,
            DeviceStateEvent::RilConnected | DeviceStateEvent::RadioAvailable
        ) {
            info!(?event, "modem ready, pushing full device state");
            self.reset();
            return;
        }

        // Barring reports are gated on the same predicate, so this
        // capture also tells us whether they were enabled before
        let was_high_power = self.is_high_power();

        if !self.apply_event(event) {
            debug!(?event, "unchanged, ignoring");
            return;
        }

        let high_power = self.is_high_power();
        if high_power != was_high_power {
            debug!(high_power, "high power state changed");
            self.event_buffer
                .push(PolicyEvent::HighPowerChanged(high_power));
        }

        let interval = self.computed_cell_info_interval();
        if interval != self.cell_info_min_interval_ms {
            debug!(interval, "cell info interval changed");
            self.cell_info_min_interval_ms = interval;
            self.request_buffer
                .push(ModemRequest::SetCellInfoMinInterval {
                    interval_ms: interval,
                });
        }

        let low_data = self.computed_low_data_expected();
        if low_data != self.low_data_expected {
            debug!(low_data, "low data expectation changed");
            self.low_data_expected = low_data;
            self.request_buffer.push(ModemRequest::SendDeviceState {
                kind: DeviceStateKind::LowDataExpected,
                enabled: low_data,
            });
        }

        let new_filter = self.computed_filter();
        let channel_config_now = new_filter.contains(IndicationFilter::PHYSICAL_CHANNEL_CONFIG);
        if channel_config_now != self.filter.contains(IndicationFilter::PHYSICAL_CHANNEL_CONFIG) {
            self.physical_channel_watch.notify(channel_config_now);
        }
        self.set_filter(new_filter, false);

        // Pull the snapshot missed while barring indications were
        // off. Must come after the filter went down, or the modem
        // answers and then keeps quiet again.
        if self.is_high_power() && !was_high_power {
            self.request_buffer.push(ModemRequest::GetBarringInfo);
        }
    }

    /// Push the complete current policy down, unconditionally.
    ///
    /// Everything the modem needs after a restart: device state
    /// flags, the indication filter, link capacity reporting criteria
    /// for every network, and the cell info interval.
    pub fn reset(&mut self) {
        self.request_buffer.push(ModemRequest::SendDeviceState {
            kind: DeviceStateKind::Charging,
            enabled: self.charging,
        });
        self.request_buffer.push(ModemRequest::SendDeviceState {
            kind: DeviceStateKind::LowDataExpected,
            enabled: self.low_data_expected,
        });
        self.request_buffer.push(ModemRequest::SendDeviceState {
            kind: DeviceStateKind::PowerSave,
            enabled: self.power_save,
        });

        let filter = self.filter;
        self.set_filter(filter, true);

        for network in AccessNetwork::ALL {
            self.request_buffer
                .push(ModemRequest::SetLinkCapacityCriteria {
                    network,
                    downlink_kbps: DOWNLINK_THRESHOLDS_KBPS.to_vec(),
                    uplink_kbps: UPLINK_THRESHOLDS_KBPS.to_vec(),
                });
        }

        self.request_buffer
            .push(ModemRequest::SetCellInfoMinInterval {
                interval_ms: self.cell_info_min_interval_ms,
            });
    }

    /// Drain buffered requests bound for the modem
    pub fn drain_requests(&mut self) -> Vec<ModemRequest> {
        std::mem::take(&mut self.request_buffer)
    }

    /// Drain pending policy events
    pub fn drain_events(&mut self) -> Vec<PolicyEvent> {
        std::mem::take(&mut self.event_buffer)
    }

    /// Apply the event to its input field; true when the value moved.
    /// Charging and power save changes also go straight to the modem.
    fn apply_event(&mut self, event: DeviceStateEvent) -> bool {
        match event {
            DeviceStateEvent::ScreenChanged(v) => set(&mut self.screen_on, v),
            DeviceStateEvent::ChargingChanged(v) => {
                let changed = set(&mut self.charging, v);
                if changed {
                    self.request_buffer.push(ModemRequest::SendDeviceState {
                        kind: DeviceStateKind::Charging,
                        enabled: v,
                    });
                }
                changed
            }
            DeviceStateEvent::PowerSaveChanged(v) => {
                let changed = set(&mut self.power_save, v);
                if changed {
                    self.request_buffer.push(ModemRequest::SendDeviceState {
                        kind: DeviceStateKind::PowerSave,
                        enabled: v,
                    });
                }
                changed
            }
            DeviceStateEvent::TetheringChanged(v) => set(&mut self.tethering, v),
            DeviceStateEvent::WifiChanged(v) => set(&mut self.wifi_connected, v),
            DeviceStateEvent::AutomotiveProjectionChanged(v) => {
                set(&mut self.automotive_projection, v)
            }
            DeviceStateEvent::AlwaysReportSignalStrengthChanged(v) => {
                set(&mut self.always_report_signal_strength, v)
            }
            DeviceStateEvent::RadioOn => set(&mut self.radio_on, true),
            DeviceStateEvent::RadioOffOrUnavailable => set(&mut self.radio_on, false),
            // Handled by reset before we get here
            DeviceStateEvent::RilConnected | DeviceStateEvent::RadioAvailable => false,
        }
    }

    fn set_filter(&mut self, new: IndicationFilter, force: bool) {
        if force || new != self.filter {
            debug!(filter = %new, force, "pushing indication filter");
            self.filter = new;
            self.request_buffer
                .push(ModemRequest::SetIndicationFilter { filter: new });
        }
    }

    fn computed_cell_info_interval(&self) -> u32 {
        if (self.screen_on && !self.wifi_connected) || (self.screen_on && self.charging) {
            CELL_INFO_INTERVAL_SHORT_MS
        } else {
            CELL_INFO_INTERVAL_LONG_MS
        }
    }

    fn computed_low_data_expected(&self) -> bool {
        (!self.charging && !self.tethering && !self.screen_on) || !self.radio_on
    }

    fn nr_tracking_active(&self) -> bool {
        match self.nr_tracking {
            NrTrackingMode::AlwaysOn => true,
            NrTrackingMode::Extended => self.nr_connected,
            NrTrackingMode::Off => false,
        }
    }

    fn computed_filter(&self) -> IndicationFilter {
        let high_power = self.is_high_power();

        // Registration failures wake the host no matter what; missing
        // one means silently losing service
        let mut filter = IndicationFilter::REGISTRATION_FAILURE;

        if high_power || (self.always_report_signal_strength && self.radio_on) {
            filter |= IndicationFilter::SIGNAL_STRENGTH;
        }
        if high_power || self.nr_tracking_active() {
            filter |= IndicationFilter::FULL_NETWORK_STATE;
            filter |= IndicationFilter::DATA_CALL_DORMANCY;
            filter |= IndicationFilter::PHYSICAL_CHANNEL_CONFIG;
        }
        if high_power {
            filter |= IndicationFilter::LINK_CAPACITY_ESTIMATE;
            filter |= IndicationFilter::BARRING_INFO;
        }
        filter
    }
}

impl Default for DeviceStatePolicy {
    fn default() -> Self {
        Self::new()
    }
}

fn set(field: &mut bool, value: bool) -> bool {
    if *field == value {
        false
    } else {
        *field = value;
        true
    }
}
