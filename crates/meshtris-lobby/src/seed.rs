//! Seed agreement by hashing the address set.

use meshtris_protocol::PeerAddress;
use sha2::{Digest, Sha256};

/// Derives the match seed from the configured peer addresses.
///
/// The addresses are sorted and de-duplicated, joined with `,`, and
/// hashed with SHA-256. The first four bytes of the digest, read
/// big-endian, are the seed. Every peer configured with the same set of
/// addresses gets the same value no matter the order it was given in.
pub fn derive_seed<'a, I>(addresses: I) -> i32
where
    I: IntoIterator<Item = &'a PeerAddress>,
{
    derive_round_seed(addresses, 0)
}

/// Seed for the `round`th match played over the same links.
///
/// Round 0 is [`derive_seed`]. Later rounds append `#<round>` to the
/// joined list before hashing, so each rematch deals a new sequence.
pub fn derive_round_seed<'a, I>(addresses: I, round: u32) -> i32
where
    I: IntoIterator<Item = &'a PeerAddress>,
{
    let mut sorted: Vec<&str> = addresses.into_iter().map(PeerAddress::as_str).collect();
    sorted.sort_unstable();
    sorted.dedup();

    let mut input = sorted.join(",");
    if round > 0 {
        input.push_str(&format!("#{round}"));
    }
    let digest = Sha256::digest(input.as_bytes());
    i32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]])
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn addrs(raw: &[&str]) -> Vec<PeerAddress> {
        raw.iter().map(|s| PeerAddress::parse(s).unwrap()).collect()
    }

    #[test]
    fn test_seed_is_first_four_digest_bytes() {
        let peers = addrs(&["b:2", "a:1"]);
        let digest = Sha256::digest(b"a:1,b:2");
        let expected = i32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
        assert_eq!(derive_seed(&peers), expected);
    }

    #[test]
    fn test_seed_depends_on_the_address_set() {
        let two = derive_seed(&addrs(&["a:1", "b:2"]));
        let three = derive_seed(&addrs(&["a:1", "b:2", "c:3"]));
        assert_ne!(two, three);
    }

    #[test]
    fn test_rematch_rounds_deal_new_seeds() {
        let peers = addrs(&["a:1", "b:2"]);
        assert_eq!(derive_round_seed(&peers, 0), derive_seed(&peers));

        let digest = Sha256::digest(b"a:1,b:2#1");
        let expected = i32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
        assert_eq!(derive_round_seed(&peers, 1), expected);
        assert_ne!(derive_round_seed(&peers, 1), derive_round_seed(&peers, 2));
    }

    #[test]
    fn test_seed_ignores_address_case() {
        assert_eq!(
            derive_seed(&addrs(&["Peer-A:7000", "peer-b:7001"])),
            derive_seed(&addrs(&["peer-a:7000", "PEER-B:7001"])),
        );
    }

    fn address() -> impl Strategy<Value = PeerAddress> {
        (1u8..=254, 1u8..=254, 1024u16..=65535)
            .prop_map(|(a, b, port)| PeerAddress::parse(&format!("10.{a}.0.{b}:{port}")).unwrap())
    }

    proptest! {
        #[test]
        fn prop_seed_ignores_order_and_duplicates(
            peers in prop::collection::vec(address(), 1..8),
            rotation in 0usize..8,
            duplicate in 0usize..8,
        ) {
            let expected = derive_seed(&peers);

            let mut shuffled = peers.clone();
            shuffled.rotate_left(rotation % peers.len());
            shuffled.reverse();
            shuffled.push(peers[duplicate % peers.len()].clone());

            prop_assert_eq!(derive_seed(&shuffled), expected);
        }
    }
}
