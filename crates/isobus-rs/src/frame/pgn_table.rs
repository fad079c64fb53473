//! Static PGN metadata table (§4.1), grounded on the original's `PGN_TABLE`.

use crate::types::{Pgn, Priority};

/// Metadata about a well-known PGN: its name, nominal payload length,
/// default priority, and whether it is always broadcast (PDU2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PgnInfo {
    pub pgn: Pgn,
    pub name: &'static str,
    pub data_length: u32,
    pub default_priority: Priority,
    pub is_broadcast: bool,
}

macro_rules! pgn_table {
    ($(($pgn:expr, $name:expr, $len:expr, $prio:expr, $bcast:expr)),* $(,)?) => {
        pub static PGN_TABLE: &[PgnInfo] = &[
            $(PgnInfo { pgn: $pgn, name: $name, data_length: $len, default_priority: $prio, is_broadcast: $bcast }),*
        ];
    };
}

pub const PGN_REQUEST: Pgn = 0x00EA00;
pub const PGN_ADDRESS_CLAIMED: Pgn = 0x00EE00;
pub const PGN_COMMANDED_ADDRESS: Pgn = 0x00FED8;
pub const PGN_TP_CM: Pgn = 0x00EC00;
pub const PGN_TP_DT: Pgn = 0x00EB00;
pub const PGN_ETP_CM: Pgn = 0x00C800;
pub const PGN_ETP_DT: Pgn = 0x00C700;
pub const PGN_ACKNOWLEDGMENT: Pgn = 0x00E800;
pub const PGN_DM1: Pgn = 0x00FECA;
pub const PGN_DM2: Pgn = 0x00FECB;
pub const PGN_DM3: Pgn = 0x00FECC;
pub const PGN_DM11: Pgn = 0x00FED3;
pub const PGN_HEARTBEAT: Pgn = 0x00F0E4;
pub const PGN_TIME_DATE: Pgn = 0x00FEE6;
pub const PGN_VEHICLE_SPEED: Pgn = 0x00FEF1;
pub const PGN_WHEEL_SPEED: Pgn = 0x00FE48;
pub const PGN_GROUND_SPEED: Pgn = 0x00FE49;
pub const PGN_MACHINE_SPEED: Pgn = 0x00F022;
pub const PGN_LANGUAGE_COMMAND: Pgn = 0x00FE0F;
pub const PGN_MAINTAIN_POWER: Pgn = 0x00FE47;
pub const PGN_GUIDANCE_MACHINE: Pgn = 0x00FE44;
pub const PGN_GUIDANCE_SYSTEM: Pgn = 0x00FE45;
pub const PGN_SHORTCUT_BUTTON: Pgn = 0x00FDB6;
pub const PGN_VT_TO_ECU: Pgn = 0x00E600;
pub const PGN_ECU_TO_VT: Pgn = 0x00E700;
pub const PGN_TC_TO_ECU: Pgn = 0x00CB00;
pub const PGN_ECU_TO_TC: Pgn = 0x00CC00;
pub const PGN_WORKING_SET_MASTER: Pgn = 0x00FE0D;
pub const PGN_GNSS_POSITION_RAPID: Pgn = 129025;
pub const PGN_GNSS_COG_SOG_RAPID: Pgn = 129026;
pub const PGN_GNSS_POSITION_DATA: Pgn = 129029;
pub const PGN_FILE_SERVER_TO_CLIENT: Pgn = 0x00AB00;
pub const PGN_FILE_CLIENT_TO_SERVER: Pgn = 0x00AA00;
pub const PGN_PRODUCT_INFO: Pgn = 126996;
pub const PGN_CONFIG_INFO: Pgn = 126998;

pgn_table![
    (PGN_REQUEST, "Request", 3, 6, false),
    (PGN_ADDRESS_CLAIMED, "Address Claimed", 8, 6, true),
    (PGN_COMMANDED_ADDRESS, "Commanded Address", 9, 6, false),
    (PGN_TP_CM, "TP.CM", 8, 7, false),
    (PGN_TP_DT, "TP.DT", 8, 7, false),
    (PGN_ETP_CM, "ETP.CM", 8, 7, false),
    (PGN_ETP_DT, "ETP.DT", 8, 7, false),
    (PGN_ACKNOWLEDGMENT, "Acknowledgment", 8, 6, false),
    (PGN_DM1, "DM1", 0, 6, true),
    (PGN_DM2, "DM2", 0, 6, true),
    (PGN_DM3, "DM3", 0, 6, true),
    (PGN_DM11, "DM11", 8, 6, true),
    (PGN_HEARTBEAT, "Heartbeat", 8, 6, true),
    (PGN_TIME_DATE, "Time/Date", 8, 6, true),
    (PGN_VEHICLE_SPEED, "Vehicle Speed", 8, 6, true),
    (PGN_WHEEL_SPEED, "Wheel Speed", 8, 6, true),
    (PGN_GROUND_SPEED, "Ground Speed", 8, 6, true),
    (PGN_MACHINE_SPEED, "Machine Speed", 8, 6, true),
    (PGN_LANGUAGE_COMMAND, "Language Command", 8, 6, true),
    (PGN_MAINTAIN_POWER, "Maintain Power", 8, 6, true),
    (PGN_GUIDANCE_MACHINE, "Guidance Machine", 8, 3, true),
    (PGN_GUIDANCE_SYSTEM, "Guidance System", 8, 3, true),
    (PGN_SHORTCUT_BUTTON, "Shortcut Button", 8, 6, true),
    (PGN_VT_TO_ECU, "VT to ECU", 8, 6, false),
    (PGN_ECU_TO_VT, "ECU to VT", 8, 6, false),
    (PGN_TC_TO_ECU, "TC to ECU", 8, 6, false),
    (PGN_ECU_TO_TC, "ECU to TC", 8, 6, false),
    (PGN_WORKING_SET_MASTER, "Working Set Master", 8, 6, true),
    (PGN_GNSS_POSITION_RAPID, "GNSS Position Rapid", 8, 2, true),
    (PGN_GNSS_COG_SOG_RAPID, "GNSS COG/SOG", 8, 2, true),
    (PGN_GNSS_POSITION_DATA, "GNSS Position Data", 0, 6, true),
    (PGN_FILE_SERVER_TO_CLIENT, "File Server to Client", 8, 6, false),
    (PGN_FILE_CLIENT_TO_SERVER, "File Client to Server", 8, 6, false),
    (PGN_PRODUCT_INFO, "Product Information", 0, 6, true),
    (PGN_CONFIG_INFO, "Configuration Information", 0, 6, true),
];

pub fn pgn_lookup(pgn: Pgn) -> Option<PgnInfo> {
    PGN_TABLE.iter().find(|entry| entry.pgn == pgn).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_pgn_resolves() {
        let info = pgn_lookup(PGN_ADDRESS_CLAIMED).unwrap();
        assert_eq!(info.name, "Address Claimed");
        assert!(info.is_broadcast);
    }

    #[test]
    fn unknown_pgn_is_none() {
        assert!(pgn_lookup(0x123456).is_none());
    }
}
