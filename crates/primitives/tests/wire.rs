use bczd_primitives::encoding::{decode, encode, DecodeError, Decoder, Encoder};
use bczd_primitives::outpoint::OutPoint;
use bczd_primitives::{sha256d, NetAddr};

fn seq_hash(start: u8) -> [u8; 32] {
    std::array::from_fn(|i| start.wrapping_add(i as u8))
}

#[test]
fn outpoint_layout_is_hash_then_index() {
    let outpoint = OutPoint::new(seq_hash(0x10), 0x0102_0304);
    let bytes = encode(&outpoint);
    assert_eq!(bytes.len(), 36);
    assert_eq!(&bytes[..32], &seq_hash(0x10));
    assert_eq!(&bytes[32..], &[0x04, 0x03, 0x02, 0x01]);
    let decoded: OutPoint = decode(&bytes).expect("outpoint");
    assert_eq!(decoded, outpoint);
}

#[test]
fn outpoints_order_by_hash_then_index() {
    let a = OutPoint::new(seq_hash(0x01), 7);
    let b = OutPoint::new(seq_hash(0x01), 8);
    let c = OutPoint::new(seq_hash(0x02), 0);
    let mut items = vec![c.clone(), b.clone(), a.clone()];
    items.sort();
    assert_eq!(items, vec![a, b, c]);
    assert!(OutPoint::null().is_null());
}

#[test]
fn truncated_outpoint_fails() {
    let bytes = encode(&OutPoint::new(seq_hash(0), 1));
    let result: Result<OutPoint, _> = decode(&bytes[..35]);
    assert_eq!(result, Err(DecodeError::UnexpectedEof));
    let mut padded = bytes.clone();
    padded.push(0);
    let result: Result<OutPoint, _> = decode(&padded);
    assert_eq!(result, Err(DecodeError::TrailingBytes));
}

#[test]
fn vector_of_addresses() {
    let addrs: Vec<NetAddr> = vec![
        "1.2.3.4:29500".parse::<std::net::SocketAddr>().expect("addr").into(),
        "[2001:db8::1]:29500".parse::<std::net::SocketAddr>().expect("addr").into(),
    ];
    let bytes = encode(&addrs);
    assert_eq!(bytes.len(), 1 + 18 * 2);
    let decoded: Vec<NetAddr> = decode(&bytes).expect("decode");
    assert_eq!(decoded, addrs);
    assert!(decoded[1].is_ipv6());
}

#[test]
fn sha256d_of_empty_input() {
    let mut encoder = Encoder::new();
    encoder.write_bytes(&[]);
    let digest = sha256d(&encoder.into_inner());
    assert_eq!(digest[0], 0x5d);
    assert_eq!(digest[31], 0x56);
    let mut decoder = Decoder::new(&digest);
    assert_eq!(decoder.read_hash_le().expect("hash"), digest);
}
