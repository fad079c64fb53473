//! End-to-end scenarios exercising the public API across module boundaries.

use isobus_rs::frame::pgn_table;
use isobus_rs::tc::client::TcAction;
use isobus_rs::tc::ddi;
use isobus_rs::tc::objects::{Device, DeviceElement, DeviceElementType, ProcessData};
use isobus_rs::tc::process_data::{decode_value, encode_acknowledge, encode_value, ProcessDataAckError, ProcessDataCommand};
use isobus_rs::tc::{Ddop, TcClient, TcClientConfig, TcClientState};
use isobus_rs::Message;

const SERVER_ADDRESS: u8 = 0x40;

fn tc_message(data: [u8; 8]) -> Message {
    Message {
        pgn: pgn_table::PGN_TC_TO_ECU,
        src: SERVER_ADDRESS,
        dst: 0x10,
        priority: 6,
        data: data.to_vec(),
        timestamp_us: 0,
    }
}

#[test]
fn ddop_round_trip() {
    let mut ddop = Ddop::default();
    let device_id = ddop.add_device(Device::default().with_id(1).with_designator("Test"));
    ddop.add_element(
        DeviceElement::default()
            .with_id(2)
            .with_kind(DeviceElementType::Device)
            .with_number(0)
            .with_parent(device_id),
    );
    ddop.add_process_data(
        ProcessData::default()
            .with_id(3)
            .with_ddi(ddi::ACTUAL_WORKING_STATE)
            .with_triggers(0x08)
            .with_designator("State"),
    );

    assert!(ddop.validate().is_ok());

    let bytes = ddop.serialize();
    let roundtripped = Ddop::deserialize(&bytes).expect("DDOP should deserialize back");

    assert_eq!(ddop.devices(), roundtripped.devices());
    assert_eq!(ddop.elements(), roundtripped.elements());
    assert_eq!(ddop.process_data(), roundtripped.process_data());
}

#[test]
fn tc_client_happy_path_then_answers_value_request() {
    let mut client = TcClient::new(TcClientConfig::default());
    client.on_value_request(|element, value_ddi| {
        if element == 3 && value_ddi == ddi::ACTUAL_WORKING_STATE {
            Some(1)
        } else {
            None
        }
    });

    client.on_connected(|| {});

    let mut ddop = Ddop::default();
    let device_id = ddop.add_device(Device::default().with_id(1).with_designator("Test"));
    ddop.add_element(DeviceElement::default().with_id(2).with_number(0).with_parent(device_id));
    client.connect(ddop);
    assert_eq!(client.state(), TcClientState::WaitForStartup);

    client.update(1000);
    assert_eq!(client.state(), TcClientState::WaitForServerStatus);

    let status = tc_message([ProcessDataCommand::Status.code(), 1, 0, 4, 0, 1, 16, 8]);
    let actions = client.on_message(&status);
    assert_eq!(actions.len(), 2);
    assert_eq!(client.state(), TcClientState::WaitForVersion);

    let capabilities = tc_message([ProcessDataCommand::TechnicalCapabilities.code(), 4, 1, 16, 8, 0, 0, 0]);
    let actions = client.on_message(&capabilities);
    assert_eq!(client.state(), TcClientState::WaitForPoolResponse);
    assert!(matches!(actions[0], TcAction::StartDdopTransfer { .. }));

    client.notify_ddop_transfer_result(Ok(()));
    assert_eq!(client.state(), TcClientState::WaitForPoolResponse);

    let pool_ack = tc_message(encode_acknowledge(0, 0, ProcessDataAckError::Ok));
    client.on_message(&pool_ack);
    assert_eq!(client.state(), TcClientState::WaitForActivation);

    let activation_ack = tc_message(encode_acknowledge(0, 0, ProcessDataAckError::Ok));
    client.on_message(&activation_ack);
    assert_eq!(client.state(), TcClientState::Connected);

    let request = tc_message(encode_value(ProcessDataCommand::RequestValue, 3, ddi::ACTUAL_WORKING_STATE, 0));
    let actions = client.on_message(&request);
    assert_eq!(actions.len(), 1);
    match &actions[0] {
        TcAction::Frame { data, .. } => {
            let decoded = decode_value(data).unwrap();
            assert_eq!(decoded.command, ProcessDataCommand::Value);
            assert_eq!(decoded.element, 3);
            assert_eq!(decoded.ddi, ddi::ACTUAL_WORKING_STATE);
            assert_eq!(decoded.value, 1);
        }
        _ => panic!("expected a single Value frame"),
    }
}
