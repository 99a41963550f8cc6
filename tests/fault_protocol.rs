//! Fault client against an in-process Thrift server on an ephemeral port.

use std::sync::{Arc, Mutex};

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use fsfault::adapters::live::ThriftConnector;
use fsfault::fault::{
    FaultError, FaultInjectionClient, FaultParams, FaultSpec, InterceptableOperation, Probability,
};
use fsfault::ports::Endpoint;
use fsfault::thrift::{
    decode_message, encode_message, ApplicationException, Message, MessageType, ThriftError, Value,
};

#[derive(Clone, Copy)]
enum Misbehavior {
    None,
    /// Answer calls to this method with an application exception.
    Reject(&'static str),
    /// Echo a different sequence id.
    WrongSeqid,
}

type Seen = Arc<Mutex<Vec<Message>>>;

async fn start_server(misbehavior: Misbehavior) -> (Endpoint, Seen) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let seen: Seen = Arc::default();
    let log = Arc::clone(&seen);

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut inbound = BytesMut::new();
        loop {
            let call = match decode_message(&inbound) {
                Ok((message, consumed)) => {
                    inbound.advance(consumed);
                    message
                }
                Err(ThriftError::Incomplete { .. }) => {
                    if socket.read_buf(&mut inbound).await.unwrap_or(0) == 0 {
                        return;
                    }
                    continue;
                }
                Err(err) => panic!("client sent a malformed message: {err}"),
            };
            log.lock().unwrap().push(call.clone());

            let reply = respond(&call, misbehavior);
            let mut outbound = BytesMut::new();
            encode_message(&reply, &mut outbound).unwrap();
            socket.write_all(&outbound).await.unwrap();
        }
    });

    (Endpoint::new("127.0.0.1", port), seen)
}

fn respond(call: &Message, misbehavior: Misbehavior) -> Message {
    match misbehavior {
        Misbehavior::Reject(name) if call.name == name => {
            let exception = ApplicationException {
                message: format!("{name} refused"),
                kind: ApplicationException::UNKNOWN_METHOD,
            };
            return Message {
                name: call.name.clone(),
                kind: MessageType::Exception,
                seqid: call.seqid,
                body: exception.to_fields(),
            };
        }
        Misbehavior::WrongSeqid => {
            return Message::reply(call.name.clone(), call.seqid + 100, Vec::new());
        }
        _ => {}
    }
    let body = if call.name == "get_methods" {
        let names: Vec<&str> = InterceptableOperation::ALL.iter().map(|op| op.wire_name()).collect();
        vec![fsfault::thrift::Field::new(0, Value::string_list(&names))]
    } else {
        Vec::new()
    };
    Message::reply(call.name.clone(), call.seqid, body)
}

fn calls(seen: &Seen) -> Vec<String> {
    seen.lock().unwrap().iter().map(|m| m.name.clone()).collect()
}

#[tokio::test]
async fn connect_clears_and_lists_operations() {
    let (endpoint, seen) = start_server(Misbehavior::None).await;
    let mut client = FaultInjectionClient::connect(&ThriftConnector::default(), endpoint).await.unwrap();

    let names = client.list_interceptable_operations().await.unwrap();
    assert_eq!(names.len(), InterceptableOperation::ALL.len());
    assert!(client.compatibility().await.unwrap().is_exact());
    client.close().await.unwrap();

    assert_eq!(calls(&seen), vec!["clear_all_faults", "get_methods", "get_methods"]);
    let seqids: Vec<i32> = seen.lock().unwrap().iter().map(|m| m.seqid).collect();
    assert_eq!(seqids, vec![1, 2, 3]);
}

#[tokio::test]
async fn set_fault_sends_every_parameter() {
    let (endpoint, seen) = start_server(Misbehavior::None).await;
    let mut client = FaultInjectionClient::connect(&ThriftConnector::default(), endpoint).await.unwrap();

    let params = FaultParams::errno(28)
        .with_probability(Probability::new(500).unwrap())
        .with_victim_pattern(".*\\.wal")
        .killing_caller()
        .with_delay_micros(2_000);
    let spec = FaultSpec::new([InterceptableOperation::Fsync, InterceptableOperation::Write], params);
    client.set_fault(&spec).await.unwrap();
    client.clear_fault(InterceptableOperation::Write).await.unwrap();
    client.clear_and_close().await.unwrap();

    let seen = seen.lock().unwrap();
    let set = &seen[1];
    assert_eq!(set.name, "set_fault");
    let Some(Value::List(_, methods)) = set.field(1) else { panic!("methods missing") };
    let mut methods: Vec<&str> = methods.iter().filter_map(Value::as_str).collect();
    methods.sort_unstable();
    assert_eq!(methods, vec!["fsync", "write"]);
    assert_eq!(set.field(2), Some(&Value::Bool(false)));
    assert_eq!(set.field(3).and_then(Value::as_i32), Some(28));
    assert_eq!(set.field(4).and_then(Value::as_i32), Some(500));
    assert_eq!(set.field(5).and_then(Value::as_str), Some(".*\\.wal"));
    assert_eq!(set.field(6), Some(&Value::Bool(true)));
    assert_eq!(set.field(7).and_then(Value::as_i32), Some(2_000));
    assert_eq!(set.field(8), Some(&Value::Bool(false)));

    assert_eq!(seen[2].name, "clear_fault");
    assert_eq!(seen[2].field(1).and_then(Value::as_str), Some("write"));
    assert_eq!(seen[3].name, "clear_all_faults");
}

#[tokio::test]
async fn exceptions_become_protocol_errors() {
    let (endpoint, _) = start_server(Misbehavior::Reject("set_all_fault")).await;
    let mut client = FaultInjectionClient::connect(&ThriftConnector::default(), endpoint).await.unwrap();

    let err = client.set_all_faults(&FaultParams::errno(5)).await.unwrap_err();
    match err {
        FaultError::Protocol(detail) => assert!(detail.contains("set_all_fault refused")),
        other => panic!("expected a protocol error, got {other:?}"),
    }
    // The connection stays usable after an application exception.
    client.clear_all_faults().await.unwrap();
    client.close().await.unwrap();
}

#[tokio::test]
async fn mismatched_sequence_ids_are_rejected() {
    let (endpoint, _) = start_server(Misbehavior::WrongSeqid).await;
    let result = FaultInjectionClient::connect(&ThriftConnector::default(), endpoint).await;
    assert!(matches!(result, Err(FaultError::Protocol(ref detail)) if detail.contains("sequence id")));
}

#[tokio::test]
async fn refused_connections_are_transport_errors() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let result = FaultInjectionClient::connect(&ThriftConnector::default(), Endpoint::new("127.0.0.1", port)).await;
    assert!(matches!(result, Err(FaultError::Transport(_))));
}
