//! Control function identity and registry shapes (§3, §4.2), grounded on the
//! original's `control_function.hpp` / `partner_cf.hpp`.

use alloc::boxed::Box;
use alloc::vec::Vec;

use crate::name::Name;
use crate::types::{Address, NULL_ADDRESS};
use crate::util::Timeout;

/// How long a matched partner may go without a fresh AddressClaimed before
/// it's considered vanished: three missed claim windows plus one grace
/// period to absorb bus contention.
pub const PARTNER_LOST_TIMEOUT_MS: u32 = 250 * 3 + 250;

/// What kind of peer a [`ControlFunction`] represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CfType {
    /// Owned by this stack; has an address-claim FSM.
    Internal,
    /// Discovered on the bus from an observed AddressClaimed.
    External,
    /// A filter-based handle created via `create_partner`.
    Partnered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CfState {
    Online,
    Offline,
}

/// A peer on the bus, identified by its immutable NAME.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlFunction {
    pub name: Name,
    address: Address,
    pub port: u8,
    pub kind: CfType,
    pub state: CfState,
}

impl ControlFunction {
    pub fn new(name: Name, port: u8, kind: CfType) -> Self {
        ControlFunction {
            name,
            address: NULL_ADDRESS,
            port,
            kind,
            state: CfState::Offline,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn address_valid(&self) -> bool {
        self.address != NULL_ADDRESS && self.address != crate::types::BROADCAST_ADDRESS
    }

    pub fn is_online(&self) -> bool {
        self.state == CfState::Online
    }

    pub(crate) fn set_address(&mut self, address: Address) {
        self.address = address;
        self.state = if self.address_valid() {
            CfState::Online
        } else {
            CfState::Offline
        };
    }

    pub(crate) fn go_offline(&mut self) {
        self.address = NULL_ADDRESS;
        self.state = CfState::Offline;
    }
}

/// Which bitfield of a NAME a [`NameFilter`] constrains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameFilterField {
    IdentityNumber,
    ManufacturerCode,
    EcuInstance,
    FunctionInstance,
    FunctionCode,
    DeviceClass,
    DeviceClassInstance,
    IndustryGroup,
    SelfConfigurable,
}

/// One predicate on a candidate NAME. A [`PartnerCf`] matches a NAME when
/// every registered filter holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NameFilter {
    pub field: NameFilterField,
    pub value: u32,
}

impl NameFilter {
    pub fn new(field: NameFilterField, value: u32) -> Self {
        NameFilter { field, value }
    }

    pub fn matches(&self, name: Name) -> bool {
        let field_value = match self.field {
            NameFilterField::IdentityNumber => name.identity_number(),
            NameFilterField::ManufacturerCode => name.manufacturer_code() as u32,
            NameFilterField::EcuInstance => name.ecu_instance() as u32,
            NameFilterField::FunctionInstance => name.function_instance() as u32,
            NameFilterField::FunctionCode => name.function_code() as u32,
            NameFilterField::DeviceClass => name.device_class() as u32,
            NameFilterField::DeviceClassInstance => name.device_class_instance() as u32,
            NameFilterField::IndustryGroup => name.industry_group() as u32,
            NameFilterField::SelfConfigurable => name.self_configurable() as u32,
        };
        field_value == self.value
    }
}

/// A filter-based handle watching for a matching external control function.
pub struct PartnerCf {
    pub port: u8,
    filters: Vec<NameFilter>,
    found: Option<ControlFunction>,
    inactivity: Timeout,
    on_lost: Option<Box<dyn FnMut()>>,
}

impl PartnerCf {
    pub fn new(port: u8, filters: Vec<NameFilter>) -> Self {
        PartnerCf {
            port,
            filters,
            found: None,
            inactivity: Timeout::new(PARTNER_LOST_TIMEOUT_MS),
            on_lost: None,
        }
    }

    pub fn matches(&self, name: Name) -> bool {
        self.filters.iter().all(|f| f.matches(name))
    }

    pub fn found(&self) -> Option<&ControlFunction> {
        self.found.as_ref()
    }

    pub fn is_found(&self) -> bool {
        self.found.is_some()
    }

    /// Register a callback fired once, the tick the partner is detached
    /// (either a CannotClaim for its NAME or staleness eviction).
    pub fn on_partner_lost(&mut self, callback: impl FnMut() + 'static) {
        self.on_lost = Some(Box::new(callback));
    }

    pub(crate) fn attach(&mut self, cf: ControlFunction) {
        self.found = Some(cf);
        self.inactivity.start(PARTNER_LOST_TIMEOUT_MS);
    }

    /// Refresh the inactivity window; called whenever a fresh AddressClaimed
    /// is seen for the matched NAME.
    pub(crate) fn note_activity(&mut self) {
        if self.found.is_some() {
            self.inactivity.restart();
        }
    }

    pub(crate) fn detach(&mut self) {
        if self.found.take().is_some() {
            self.inactivity.cancel();
            if let Some(cb) = self.on_lost.as_mut() {
                cb();
            }
        }
    }

    /// Advance the inactivity window. Returns `true` the tick the partner is
    /// evicted for staleness.
    pub(crate) fn update(&mut self, elapsed_ms: u32) -> bool {
        if self.found.is_none() {
            return false;
        }
        if self.inactivity.update(elapsed_ms) {
            self.detach();
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_filter_matches_identity() {
        let name = Name::new(0).set_identity_number(42).set_device_class(7);
        let filter = NameFilter::new(NameFilterField::IdentityNumber, 42);
        assert!(filter.matches(name));
        let filter2 = NameFilter::new(NameFilterField::DeviceClass, 8);
        assert!(!filter2.matches(name));
    }

    #[test]
    fn partner_requires_all_filters() {
        let name = Name::new(0).set_identity_number(42).set_device_class(7);
        let partner = PartnerCf::new(
            0,
            alloc::vec![
                NameFilter::new(NameFilterField::IdentityNumber, 42),
                NameFilter::new(NameFilterField::DeviceClass, 7),
            ],
        );
        assert!(partner.matches(name));
        let other = Name::new(0).set_identity_number(42).set_device_class(1);
        assert!(!partner.matches(other));
    }

    #[test]
    fn control_function_online_transition() {
        let mut cf = ControlFunction::new(Name::new(1), 0, CfType::Internal);
        assert!(!cf.is_online());
        cf.set_address(0x28);
        assert!(cf.is_online());
        assert_eq!(cf.address(), 0x28);
    }

    #[test]
    fn stale_partner_is_evicted_and_callback_fires() {
        use alloc::rc::Rc;
        use core::cell::Cell;

        let mut partner = PartnerCf::new(0, Vec::new());
        let mut cf = ControlFunction::new(Name::new(7), 0, CfType::Partnered);
        cf.set_address(0x30);
        partner.attach(cf);
        assert!(partner.is_found());

        let lost = Rc::new(Cell::new(false));
        let lost2 = lost.clone();
        partner.on_partner_lost(move || lost2.set(true));

        assert!(!partner.update(PARTNER_LOST_TIMEOUT_MS - 1));
        assert!(partner.is_found());
        assert!(!lost.get());

        assert!(partner.update(1));
        assert!(!partner.is_found());
        assert!(lost.get());
    }

    #[test]
    fn activity_resets_the_inactivity_window() {
        let mut partner = PartnerCf::new(0, Vec::new());
        let mut cf = ControlFunction::new(Name::new(7), 0, CfType::Partnered);
        cf.set_address(0x30);
        partner.attach(cf);

        partner.update(PARTNER_LOST_TIMEOUT_MS - 1);
        partner.note_activity();
        assert!(!partner.update(PARTNER_LOST_TIMEOUT_MS - 1));
        assert!(partner.is_found());
    }

    #[test]
    fn explicit_detach_fires_callback_once() {
        use alloc::rc::Rc;
        use core::cell::Cell;

        let mut partner = PartnerCf::new(0, Vec::new());
        let mut cf = ControlFunction::new(Name::new(7), 0, CfType::Partnered);
        cf.set_address(0x30);
        partner.attach(cf);

        let calls = Rc::new(Cell::new(0u32));
        let calls2 = calls.clone();
        partner.on_partner_lost(move || calls2.set(calls2.get() + 1));

        partner.detach();
        partner.detach();
        assert_eq!(calls.get(), 1);
    }
}
