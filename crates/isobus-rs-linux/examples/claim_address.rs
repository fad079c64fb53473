//! Claims an address on a physical CAN bus and logs every NAME seen
//! thereafter.
//!
//! Run with:
//!   cargo run --example claim_address -- can0

use isobus_rs::{Name, NetworkConfig, NetworkManager};
use isobus_rs_linux::SocketCanEndpoint;
use log::info;
use std::{env, thread, time::Duration};

fn main() {
    env_logger::init();
    let interface = env::args().nth(1).unwrap_or_else(|| "can0".into());

    let endpoint = SocketCanEndpoint::open(&interface).expect("failed to open CAN interface");

    let mut network = NetworkManager::new(NetworkConfig::default());
    network.set_endpoint(0, Box::new(endpoint)).expect("failed to bind endpoint");

    let name = Name::new(0)
        .set_self_configurable(true)
        .set_industry_group(2) // agricultural and forestry equipment
        .set_function_code(25) // task controller / generic ECU
        .set_identity_number(1);
    let cf = network
        .create_internal(name, 0, 0x80)
        .expect("failed to register internal control function");

    loop {
        network.update(100);
        if network.control_function(cf).is_online() {
            info!("claimed address {}", network.control_function(cf).address());
            break;
        }
        thread::sleep(Duration::from_millis(100));
    }

    loop {
        network.update(100);
        thread::sleep(Duration::from_millis(100));
    }
}
