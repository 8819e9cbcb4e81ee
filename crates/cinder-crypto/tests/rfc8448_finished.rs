//! RFC 8448 §3 "Simple 1-RTT Handshake": both Finished messages computed
//! from the published handshake messages and traffic secrets.

use cinder_crypto::{
    CryptoError, HandshakeContext, HandshakeSecret, HashAlgorithm, KeySchedule, Sha256,
    Transcript, make_handshake_context,
};

/// ClientHello
const CLIENT_HELLO: &str = concat!(
    "010000c00303cb34ecb1e78163ba1c38c6dacb196a6dffa21a8d9912ec18a2ef6283024dece70000",
    "06130113031302010000910000000b0009000006736572766572ff01000100000a00140012001d00",
    "17001800190100010101020103010400230000003300260024001d002099381de560e4bd43d23d8e",
    "435a7dbafeb3c06e51c13cae4d5413691e529aaf2c002b0003020304000d0020001e040305030603",
    "020308040805080604010501060102010402050206020202002d00020101001c00024001",
);

/// ServerHello
const SERVER_HELLO: &str = concat!(
    "020000560303a6af06a4121860dc5e6e60249cd34c95930c8ac5cb1434dac155772ed3e269280013",
    "0100002e00330024001d0020c9828876112095fe66762bdbf7c672e156d6cc253b833df1dd69b1b0",
    "4e751f0f002b00020304",
);

/// EncryptedExtensions
const ENCRYPTED_EXTENSIONS: &str = concat!(
    "080000240022000a00140012001d00170018001901000101010201030104001c0002400100000000",
);

/// Certificate (single RSA certificate, no extensions)
const CERTIFICATE: &str = concat!(
    "0b0001b9000001b50001b0308201ac30820115a003020102020102300d06092a864886f70d01010b",
    "0500300e310c300a06035504031303727361301e170d3136303733303031323335395a170d323630",
    "3733303031323335395a300e310c300a0603550403130372736130819f300d06092a864886f70d01",
    "0101050003818d0030818902818100b4bb498f8279303d980836399b36c6988c0c68de55e1bdb826",
    "d3901a2461eafd2de49a91d015abbc9a95137ace6c1af19eaa6af98c7ced43120998e187a80ee0cc",
    "b0524b1b018c3e0b63264d449a6d38e22a5fda430846748030530ef0461c8ca9d9efbfae8ea6d1d0",
    "3e2bd193eff0ab9a8002c47428a6d35a8d88d79f7f1e3f0203010001a31a301830090603551d1304",
    "023000300b0603551d0f0404030205a0300d06092a864886f70d01010b05000381810085aad2a0e5",
    "b9276b908c65f73a7267170618a54c5f8a7b337d2df7a594365417f2eae8f8a58c8f8172f9319cf3",
    "6b7fd6c55b80f21a03015156726096fd335e5e67f2dbf102702e608ccae6bec1fc63a42a99be5c3e",
    "b7107c3c54e9b9eb2bd5203b1c3b84e0a8b2f759409ba3eac9d91d402dcc0cc8f8961229ac9187b4",
    "2b4de10000",
);

/// CertificateVerify (rsa_pss_rsae_sha256)
const CERTIFICATE_VERIFY: &str = concat!(
    "0f000084080400805a747c5d88fa9bd2e55ab085a61015b7211f824cd484145ab3ff52f1fda8477b",
    "0b7abc90db78e2d33a5c141a078653fa6bef780c5ea248eeaaa785c4f394cab6d30bbe8d4859ee51",
    "1f602957b15411ac027671459e46445c9ea58c181e818e95b8c3fb0bf3278409d3be152a3da5043e",
    "063dda65cdf5aea20d53dfacd42f74f3",
);

/// Everything the server sends before its Finished.
const SERVER_FLIGHT: [&str; 5] =
    [CLIENT_HELLO, SERVER_HELLO, ENCRYPTED_EXTENSIONS, CERTIFICATE, CERTIFICATE_VERIFY];

const ECDHE: &str = "8bd4054fb55b9d63fdfbacf9f04b9f0d35e6d63f537563efd46272900f89492d";
const HELLO_HASH: &str = "860c06edc07858ee8e78f0e7428c58edd6b43f2ca3e6e95f02ed063cf0e1cad8";
const SERVER_FINISHED_HASH: &str =
    "9608102a0f1ccc6db6250b7b7e417b1a000eaada3daae4777a7686c9ff83df13";
const SERVER_VERIFY_DATA: &str =
    "9b9b141d906337fbd2cbdce71df4deda4ab42c309572cb7fffee5454b78f0718";
const CLIENT_VERIFY_DATA: &str =
    "a8ec436d677634ae525ac1fcebe11a039ec17694fac6e98527b642f2edd5ce61";

fn unhex(s: &str) -> Vec<u8> {
    hex::decode(s).unwrap()
}

fn server_flight() -> Transcript<Sha256> {
    let mut transcript = Transcript::<Sha256>::new();
    for message in SERVER_FLIGHT {
        transcript.append_to_transcript(&unhex(message));
    }
    transcript
}

fn handshake_traffic() -> (Vec<u8>, Vec<u8>) {
    let mut schedule = KeySchedule::new(HashAlgorithm::Sha256, None);
    schedule.derive_handshake_secret(&unhex(ECDHE)).unwrap();
    let client =
        schedule.get_secret(HandshakeSecret::ClientHandshakeTraffic, &unhex(HELLO_HASH)).unwrap();
    let server =
        schedule.get_secret(HandshakeSecret::ServerHandshakeTraffic, &unhex(HELLO_HASH)).unwrap();
    (client.to_vec(), server.to_vec())
}

fn finished_message(verify_data: &[u8]) -> Vec<u8> {
    let mut message = vec![20, 0, 0, verify_data.len() as u8];
    message.extend_from_slice(verify_data);
    message
}

#[test]
fn hello_hash_matches_published_value() {
    let mut transcript = Transcript::<Sha256>::new();
    transcript.append_to_transcript(&unhex(CLIENT_HELLO));
    transcript.append_to_transcript(&unhex(SERVER_HELLO));
    assert_eq!(hex::encode(transcript.handshake_context()), HELLO_HASH);
}

#[test]
fn server_finished_matches_published_verify_data() {
    let (_, server_traffic) = handshake_traffic();
    let transcript = server_flight();

    let verify_data = transcript.finished_data(&server_traffic).unwrap();
    assert_eq!(hex::encode(&verify_data), SERVER_VERIFY_DATA);
    transcript.verify_finished(&server_traffic, &unhex(SERVER_VERIFY_DATA)).unwrap();
}

#[test]
fn client_finished_matches_published_verify_data() {
    let (client_traffic, _) = handshake_traffic();
    let mut transcript = make_handshake_context(HashAlgorithm::Sha256);
    for message in SERVER_FLIGHT {
        transcript.append_to_transcript(&unhex(message));
    }
    transcript.append_to_transcript(&finished_message(&unhex(SERVER_VERIFY_DATA)));

    assert_eq!(hex::encode(transcript.handshake_context()), SERVER_FINISHED_HASH);
    assert_eq!(
        hex::encode(transcript.finished_data(&client_traffic).unwrap()),
        CLIENT_VERIFY_DATA
    );
}

#[test]
fn server_finished_with_client_key_is_rejected() {
    let (client_traffic, _) = handshake_traffic();
    let transcript = server_flight();
    assert_eq!(
        transcript.verify_finished(&client_traffic, &unhex(SERVER_VERIFY_DATA)),
        Err(CryptoError::FinishedMismatch)
    );
}
