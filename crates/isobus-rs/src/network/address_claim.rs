//! ISO 11783-5 §4 address-claim arbitration (§4.3).

use alloc::vec::Vec;

use crate::name::Name;
use crate::types::{
    Address, ARBITRARY_ADDRESS_RANGE_END, ARBITRARY_ADDRESS_RANGE_START, NULL_ADDRESS,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressClaimState {
    NotStarted,
    WaitForRandomDelay,
    SendRequestForClaim,
    WaitForClaimsBeforeSend,
    ClaimingAddress,
    WaitForAddressContention,
    AddressClaimed,
    UnableToClaim,
}

/// Something the owning [`crate::network::NetworkManager`] must put on the
/// wire as a result of a state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimAction {
    SendRequestForClaim,
    SendAddressClaimed { address: Address },
    SendCannotClaim,
}

const WAIT_FOR_CLAIMS_MS: u32 = 250;
const CONTENTION_WINDOW_MS: u32 = 250;

/// A startup delay in [0, 153] ms derived from the NAME (ISO 11783-5 §4.2
/// mandates a random delay in this exact range to avoid claim storms when
/// many ECUs power on together). Hashing the NAME's low byte is enough to
/// spread ECUs apart without pulling a `rand` dependency into a `no_std`
/// core.
fn startup_delay_ms(seed: u64) -> u32 {
    (seed & 0xFF) as u32 % 154
}

/// Per-internal-CF claim state machine.
pub struct AddressClaim {
    pub name: Name,
    candidate_address: Address,
    state: AddressClaimState,
    state_elapsed_ms: u32,
    delay_ms: u32,
    next_arbitrary: Address,
}

impl AddressClaim {
    pub fn new(name: Name, preferred_address: Address) -> Self {
        AddressClaim {
            name,
            candidate_address: preferred_address,
            state: AddressClaimState::NotStarted,
            state_elapsed_ms: 0,
            delay_ms: startup_delay_ms(name.raw()),
            next_arbitrary: ARBITRARY_ADDRESS_RANGE_START,
        }
    }

    pub fn state(&self) -> AddressClaimState {
        self.state
    }

    pub fn candidate_address(&self) -> Address {
        self.candidate_address
    }

    pub fn is_online(&self) -> bool {
        self.state == AddressClaimState::AddressClaimed
    }

    /// Kick off arbitration: enters `WaitForRandomDelay` with a NAME-derived
    /// startup delay.
    pub fn start(&mut self) {
        self.state = AddressClaimState::WaitForRandomDelay;
        self.state_elapsed_ms = 0;
    }

    /// Advance the FSM by `elapsed_ms`, cascading through as many
    /// zero-cost/expired transitions as the elapsed budget allows. Returns
    /// every frame the caller must transmit as a result, in order.
    pub fn update(&mut self, elapsed_ms: u32) -> Vec<ClaimAction> {
        let mut actions = Vec::new();
        let mut remaining = elapsed_ms;
        loop {
            match self.state {
                AddressClaimState::NotStarted
                | AddressClaimState::AddressClaimed
                | AddressClaimState::UnableToClaim => break,
                AddressClaimState::WaitForRandomDelay => {
                    self.state_elapsed_ms += remaining;
                    remaining = 0;
                    if self.state_elapsed_ms >= self.delay_ms {
                        remaining = self.state_elapsed_ms - self.delay_ms;
                        self.state = AddressClaimState::SendRequestForClaim;
                        self.state_elapsed_ms = 0;
                        continue;
                    }
                    break;
                }
                AddressClaimState::SendRequestForClaim => {
                    actions.push(ClaimAction::SendRequestForClaim);
                    self.state = AddressClaimState::WaitForClaimsBeforeSend;
                    self.state_elapsed_ms = 0;
                    continue;
                }
                AddressClaimState::WaitForClaimsBeforeSend => {
                    self.state_elapsed_ms += remaining;
                    remaining = 0;
                    if self.state_elapsed_ms >= WAIT_FOR_CLAIMS_MS {
                        remaining = self.state_elapsed_ms - WAIT_FOR_CLAIMS_MS;
                        self.state = AddressClaimState::ClaimingAddress;
                        self.state_elapsed_ms = 0;
                        continue;
                    }
                    break;
                }
                AddressClaimState::ClaimingAddress => {
                    actions.push(ClaimAction::SendAddressClaimed {
                        address: self.candidate_address,
                    });
                    self.state = AddressClaimState::WaitForAddressContention;
                    self.state_elapsed_ms = 0;
                    continue;
                }
                AddressClaimState::WaitForAddressContention => {
                    self.state_elapsed_ms += remaining;
                    remaining = 0;
                    if self.state_elapsed_ms >= CONTENTION_WINDOW_MS {
                        self.state = AddressClaimState::AddressClaimed;
                        self.state_elapsed_ms = 0;
                    }
                    break;
                }
            }
        }
        actions
    }

    /// An AddressClaimed was observed for `peer_address`, carrying `peer_name`.
    /// Only meaningful while defending or attempting `peer_address`.
    pub fn handle_external_claim(&mut self, peer_address: Address, peer_name: Name) -> Option<ClaimAction> {
        if peer_address != self.candidate_address {
            return None;
        }
        match self.state {
            AddressClaimState::WaitForAddressContention | AddressClaimState::AddressClaimed => {
                if peer_name < self.name {
                    if self.name.self_configurable() {
                        self.candidate_address = self.next_free_arbitrary();
                        self.state = AddressClaimState::ClaimingAddress;
                        self.state_elapsed_ms = 0;
                        None
                    } else {
                        self.state = AddressClaimState::UnableToClaim;
                        Some(ClaimAction::SendCannotClaim)
                    }
                } else {
                    self.state = AddressClaimState::WaitForAddressContention;
                    self.state_elapsed_ms = 0;
                    Some(ClaimAction::SendAddressClaimed {
                        address: self.candidate_address,
                    })
                }
            }
            _ => None,
        }
    }

    /// A `Request(AddressClaimed)` arrived while `UnableToClaim`; the CF must
    /// still answer with CannotClaim.
    pub fn handle_request_while_unable(&self) -> Option<ClaimAction> {
        if self.state == AddressClaimState::UnableToClaim {
            Some(ClaimAction::SendCannotClaim)
        } else {
            None
        }
    }

    fn next_free_arbitrary(&mut self) -> Address {
        let addr = self.next_arbitrary;
        if self.next_arbitrary >= ARBITRARY_ADDRESS_RANGE_END {
            self.next_arbitrary = NULL_ADDRESS;
        } else {
            self.next_arbitrary += 1;
        }
        addr
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn self_configurable_name(identity: u32) -> Name {
        Name::new(0).set_identity_number(identity).set_self_configurable(true)
    }

    #[test]
    fn unopposed_claim_reaches_address_claimed_in_three_ticks() {
        // Scenario 1: NAME raw 0x8000_0000_0000_002A (identity 42, self-configurable).
        let mut claim = AddressClaim::new(Name::new(0x8000_0000_0000_002A), 0x28);
        claim.start();

        let a1 = claim.update(200);
        assert_eq!(a1, alloc::vec![ClaimAction::SendRequestForClaim]);

        let a2 = claim.update(200);
        assert_eq!(a2, alloc::vec![ClaimAction::SendAddressClaimed { address: 0x28 }]);

        let a3 = claim.update(200);
        assert!(a3.is_empty());

        assert_eq!(claim.state(), AddressClaimState::AddressClaimed);
        assert_eq!(claim.candidate_address(), 0x28);
    }

    #[test]
    fn loses_to_lower_name_and_moves_to_arbitrary_range() {
        let mut claim = AddressClaim::new(self_configurable_name(100), 0x28);
        claim.start();
        claim.update(200);
        claim.update(200);
        claim.update(200); // now AddressClaimed, candidate = 0x28

        let lower_name = self_configurable_name(1);
        let action = claim.handle_external_claim(0x28, lower_name);
        assert_eq!(action, None);
        assert_eq!(claim.state(), AddressClaimState::ClaimingAddress);
        assert_eq!(claim.candidate_address(), ARBITRARY_ADDRESS_RANGE_START);
    }

    #[test]
    fn wins_against_higher_name_and_rebroadcasts() {
        // Scenario 2: during WaitForAddressContention a higher NAME arrives for 0x28.
        let mut claim = AddressClaim::new(Name::new(0x8000_0000_0000_002A), 0x28);
        claim.start();
        claim.update(200);
        claim.update(200);
        assert_eq!(claim.state(), AddressClaimState::WaitForAddressContention);

        let higher_name = Name::new(0x8000_0000_0000_002B);
        let action = claim.handle_external_claim(0x28, higher_name);
        assert_eq!(action, Some(ClaimAction::SendAddressClaimed { address: 0x28 }));
        assert_eq!(claim.state(), AddressClaimState::WaitForAddressContention);

        claim.update(300);
        assert_eq!(claim.state(), AddressClaimState::AddressClaimed);
        assert_eq!(claim.candidate_address(), 0x28);
    }

    #[test]
    fn non_self_configurable_loses_goes_unable() {
        let mut claim = AddressClaim::new(Name::new(100), 0x28);
        claim.start();
        claim.update(200);
        claim.update(200);
        claim.update(200);

        let lower_name = Name::new(1);
        let action = claim.handle_external_claim(0x28, lower_name);
        assert_eq!(action, Some(ClaimAction::SendCannotClaim));
        assert_eq!(claim.state(), AddressClaimState::UnableToClaim);
        assert_eq!(
            claim.handle_request_while_unable(),
            Some(ClaimAction::SendCannotClaim)
        );
    }
}
