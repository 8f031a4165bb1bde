mod common;

use hive_flight::wire::decode_command;
use prost::Message;

use common::{statement_command, AnyEnvelope, CommandStatementQuery};

#[test]
fn decodes_prost_encoded_statement() {
    let query = "SELECT * FROM default.user_credit WHERE ID='id0001'";
    let payload = CommandStatementQuery {
        query: query.to_string(),
        transaction_id: None,
    }
    .encode_to_vec();
    assert_eq!(decode_command(&payload), query);
}

#[test]
fn decodes_any_wrapped_statement_with_transaction_id() {
    let query = "SELECT order_amount FROM default.user_stats WHERE ID='id0005'";
    assert_eq!(decode_command(&statement_command(query)), query);
}

#[test]
fn any_wrapped_and_plain_payloads_agree() {
    let query = format!("SELECT '{}'", "ü".repeat(300));
    let plain = CommandStatementQuery {
        query: query.clone(),
        transaction_id: Some(vec![0x80; 40]),
    }
    .encode_to_vec();
    let wrapped = AnyEnvelope {
        type_url: common::STATEMENT_QUERY_TYPE_URL.to_string(),
        value: plain.clone(),
    }
    .encode_to_vec();
    assert_eq!(decode_command(&plain), query);
    assert_eq!(decode_command(&wrapped), decode_command(&plain));
}

#[test]
fn empty_statement_decodes_to_raw_payload() {
    // prost omits default-valued fields, so an empty query has no field 1.
    let payload = CommandStatementQuery::default().encode_to_vec();
    assert!(payload.is_empty());
    assert_eq!(decode_command(&payload), "");
}
