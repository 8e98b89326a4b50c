//! Storage-proof normalization.
//!
//! `eth_getProof` returns the trie nodes from the storage root down to the
//! requested slot. When the slot's value is short enough to be embedded
//! inline in its parent branch node, the returned proof stops at that
//! branch, one level above what the portal's Merkle-Patricia verifier
//! walks to. [`maybe_add_proof_node`] detects that case and appends the
//! embedded node, re-encoded standalone, so the proof terminates at the
//! value. Skipping the fix-up makes the portal's verifier fail without a
//! useful error.

use alloy_primitives::{Bytes, B256};
use alloy_rlp::Header;
use alloy_trie::Nibbles;
use eyre::{eyre, Result};

const BRANCH_NODE_ITEMS: usize = 17;

/// Append the embedded terminal node to `proof` when the last element is a
/// branch node holding the slot's value inline.
///
/// `key` is the hashed trie path of the storage slot, i.e.
/// `keccak256(slot)`. Proofs that already terminate in a standalone leaf
/// or extension node are returned unchanged.
pub fn maybe_add_proof_node(key: B256, mut proof: Vec<Bytes>) -> Result<Vec<Bytes>> {
    let tail = match proof.last() {
        Some(last) => find_embedded_tail(key, last)?,
        None => None,
    };
    if let Some(node) = tail {
        proof.push(node);
    }
    Ok(proof)
}

/// Look inside a final branch node for an embedded node whose compact-path
/// suffix matches the tail of the key nibbles.
fn find_embedded_tail(key: B256, last_node: &[u8]) -> Result<Option<Bytes>> {
    let items = decode_list_items(last_node)?;
    if items.len() != BRANCH_NODE_ITEMS {
        return Ok(None);
    }

    let key_nibbles = Nibbles::unpack(key);
    for item in items {
        // Hash references and empty slots are RLP strings; only embedded
        // nodes are themselves lists.
        if !is_list(item) {
            continue;
        }
        let embedded = decode_list_items(item)?;
        if embedded.len() != 2 {
            continue;
        }
        let suffix = compact_path_nibbles(string_payload(embedded[0])?);
        if key_nibbles.ends_with(&suffix) {
            return Ok(Some(Bytes::copy_from_slice(item)));
        }
    }

    Ok(None)
}

/// Split an RLP list into the raw encodings of its items.
fn decode_list_items(node: &[u8]) -> Result<Vec<&[u8]>> {
    let mut buf = node;
    let header = Header::decode(&mut buf).map_err(|e| eyre!("invalid RLP node: {e}"))?;
    if !header.list {
        return Err(eyre!("expected an RLP list node"));
    }
    let payload = buf
        .get(..header.payload_length)
        .ok_or_else(|| eyre!("truncated RLP payload"))?;

    let mut items = Vec::new();
    let mut rest = payload;
    while !rest.is_empty() {
        let item_length = encoded_item_length(rest)?;
        items.push(&rest[..item_length]);
        rest = &rest[item_length..];
    }
    Ok(items)
}

/// Total encoded length (header plus payload) of the next RLP item.
fn encoded_item_length(buf: &[u8]) -> Result<usize> {
    let mut peek = buf;
    let header = Header::decode(&mut peek).map_err(|e| eyre!("invalid RLP item: {e}"))?;
    Ok(buf.len() - peek.len() + header.payload_length)
}

fn is_list(item: &[u8]) -> bool {
    item.first().is_some_and(|b| *b >= 0xc0)
}

/// Payload bytes of an RLP string item.
fn string_payload(item: &[u8]) -> Result<&[u8]> {
    let mut buf = item;
    let header = Header::decode(&mut buf).map_err(|e| eyre!("invalid RLP string: {e}"))?;
    if header.list {
        return Err(eyre!("expected an RLP string item"));
    }
    Ok(&buf[..header.payload_length])
}

/// Suffix nibbles of a compact (hex-prefix) encoded path. The flag nibble
/// and, for even-length paths, the padding nibble are stripped; the rest
/// unpacks like any other nibble sequence.
fn compact_path_nibbles(encoded: &[u8]) -> Nibbles {
    let Some((&first, rest)) = encoded.split_first() else {
        return Nibbles::default();
    };
    let mut nibbles = Vec::with_capacity(1 + rest.len() * 2);
    if first & 0x10 != 0 {
        nibbles.push(first & 0x0f);
    }
    nibbles.extend(Nibbles::unpack(rest).to_vec());
    Nibbles::from_nibbles(&nibbles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::keccak256;
    use alloy_rlp::Encodable;

    fn unpack_nibbles(bytes: &[u8]) -> Vec<u8> {
        Nibbles::unpack(bytes).to_vec()
    }

    fn rlp_string(data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        data.encode(&mut out);
        out
    }

    fn rlp_list(items: &[Vec<u8>]) -> Vec<u8> {
        let payload: Vec<u8> = items.concat();
        let mut out = Vec::new();
        Header {
            list: true,
            payload_length: payload.len(),
        }
        .encode(&mut out);
        out.extend_from_slice(&payload);
        out
    }

    fn compact_encode(nibbles: &[u8], leaf: bool) -> Vec<u8> {
        let odd = nibbles.len() % 2 == 1;
        let flag: u8 = match (leaf, odd) {
            (false, false) => 0x00,
            (false, true) => 0x10,
            (true, false) => 0x20,
            (true, true) => 0x30,
        };
        let mut out = Vec::with_capacity(1 + nibbles.len() / 2);
        let mut rest = nibbles;
        if odd {
            out.push(flag | nibbles[0]);
            rest = &nibbles[1..];
        } else {
            out.push(flag);
        }
        for pair in rest.chunks(2) {
            out.push((pair[0] << 4) | pair[1]);
        }
        out
    }

    /// A storage trie for one key whose `true` value ends up embedded
    /// inline in a branch node:
    ///
    ///   extension (first 63 nibbles) -> branch -> inline leaf [0x20, 0x01]
    ///
    /// The branch is padded with two fake hash children so it crosses the
    /// 32-byte inlining threshold and is referenced by hash from the
    /// extension. Returns (storage_root, key, raw_proof).
    fn inline_value_fixture(key: B256) -> (B256, Vec<Bytes>) {
        let nibbles = unpack_nibbles(key.as_slice());

        let leaf = rlp_list(&[rlp_string(&compact_encode(&[], true)), rlp_string(&[0x01])]);
        assert!(leaf.len() < 32, "leaf must stay inline");

        let mut branch_items: Vec<Vec<u8>> = vec![rlp_string(&[]); 17];
        branch_items[nibbles[63] as usize] = leaf.clone();
        // fake siblings to push the branch over the inlining threshold
        branch_items[(nibbles[63] as usize + 1) % 16] = rlp_string(&[0x33; 32]);
        branch_items[(nibbles[63] as usize + 2) % 16] = rlp_string(&[0x44; 32]);
        let branch = rlp_list(&branch_items);
        assert!(branch.len() >= 32, "branch must be hash-referenced");

        let extension = rlp_list(&[
            rlp_string(&compact_encode(&nibbles[..63], false)),
            rlp_string(keccak256(&branch).as_slice()),
        ]);
        let root = keccak256(&extension);

        (root, vec![Bytes::from(extension), Bytes::from(branch)])
    }

    /// Minimal Merkle-Patricia inclusion check in the style of the
    /// portal's on-chain verifier: every traversal step must resolve to a
    /// proof element (by hash for >= 32-byte references, by raw equality
    /// for inline ones) and the walk must end on a leaf holding the value.
    fn verify_inclusion(root: B256, key: B256, expected_value: &[u8], proof: &[Bytes]) -> bool {
        let path = unpack_nibbles(key.as_slice());
        let mut offset = 0usize;
        let mut reference: Vec<u8> = root.to_vec();

        for node in proof {
            let matches_reference = if reference.len() == 32 {
                keccak256(node).as_slice() == reference.as_slice()
            } else {
                node.as_ref() == reference.as_slice()
            };
            if !matches_reference {
                return false;
            }

            let Ok(items) = decode_list_items(node) else {
                return false;
            };
            match items.len() {
                17 => {
                    let Some(&nibble) = path.get(offset) else {
                        return false;
                    };
                    offset += 1;
                    let child = items[nibble as usize];
                    reference = if is_list(child) {
                        child.to_vec()
                    } else {
                        let Ok(payload) = string_payload(child) else {
                            return false;
                        };
                        if payload.is_empty() {
                            return false;
                        }
                        payload.to_vec()
                    };
                }
                2 => {
                    let Ok(encoded_path) = string_payload(items[0]) else {
                        return false;
                    };
                    let suffix = compact_path_nibbles(encoded_path).to_vec();
                    let leaf = encoded_path
                        .first()
                        .is_some_and(|flag| flag & 0x20 != 0);
                    if path[offset..] == suffix[..] && leaf {
                        let Ok(value) = string_payload(items[1]) else {
                            return false;
                        };
                        return value == expected_value;
                    }
                    if !leaf && path[offset..].starts_with(&suffix) {
                        offset += suffix.len();
                        let child = items[1];
                        reference = if is_list(child) {
                            child.to_vec()
                        } else {
                            match string_payload(child) {
                                Ok(payload) => payload.to_vec(),
                                Err(_) => return false,
                            }
                        };
                    } else {
                        return false;
                    }
                }
                _ => return false,
            }
        }

        // Ran out of proof elements before reaching the value.
        false
    }

    #[test]
    fn test_appends_exactly_one_node_for_inline_value() {
        let key = keccak256(b"withdrawal-slot");
        let (_, raw_proof) = inline_value_fixture(key);

        let normalized = maybe_add_proof_node(key, raw_proof.clone()).unwrap();
        assert_eq!(normalized.len(), raw_proof.len() + 1);

        // A second pass is a no-op: the proof now ends in a leaf.
        let again = maybe_add_proof_node(key, normalized.clone()).unwrap();
        assert_eq!(again, normalized);
    }

    #[test]
    fn test_normalized_proof_verifies_raw_does_not() {
        let key = keccak256(b"withdrawal-slot");
        let (root, raw_proof) = inline_value_fixture(key);

        assert!(!verify_inclusion(root, key, &[0x01], &raw_proof));

        let normalized = maybe_add_proof_node(key, raw_proof).unwrap();
        assert!(verify_inclusion(root, key, &[0x01], &normalized));
    }

    #[test]
    fn test_leaf_terminated_proof_is_unchanged() {
        let key = keccak256(b"another-slot");
        let nibbles = unpack_nibbles(key.as_slice());

        // Root is itself a leaf covering the whole path.
        let leaf = rlp_list(&[
            rlp_string(&compact_encode(&nibbles, true)),
            rlp_string(&[0x01]),
        ]);
        let proof = vec![Bytes::from(leaf)];

        let normalized = maybe_add_proof_node(key, proof.clone()).unwrap();
        assert_eq!(normalized, proof);
    }

    #[test]
    fn test_branch_of_hashes_is_unchanged() {
        let key = keccak256(b"hash-children");
        let branch_items: Vec<Vec<u8>> = (0..17).map(|_| rlp_string(&[0x55; 32])).collect();
        let branch = rlp_list(&branch_items);
        let proof = vec![Bytes::from(branch)];

        let normalized = maybe_add_proof_node(key, proof.clone()).unwrap();
        assert_eq!(normalized, proof);
    }

    #[test]
    fn test_non_matching_inline_sibling_is_ignored() {
        let key = keccak256(b"sibling-case");
        let nibbles = unpack_nibbles(key.as_slice());

        // Inline leaf sits in a branch slot off the key path, with a
        // one-nibble path that cannot match the key tail.
        let wrong_nibble = (nibbles[63] + 1) % 16;
        let sibling_leaf = rlp_list(&[
            rlp_string(&compact_encode(&[(wrong_nibble + 1) % 16], true)),
            rlp_string(&[0x01]),
        ]);
        let mut branch_items: Vec<Vec<u8>> = vec![rlp_string(&[]); 17];
        branch_items[wrong_nibble as usize] = sibling_leaf;
        branch_items[nibbles[63] as usize] = rlp_string(&[0x66; 32]);
        let branch = rlp_list(&branch_items);
        let proof = vec![Bytes::from(branch)];

        let normalized = maybe_add_proof_node(key, proof.clone()).unwrap();
        assert_eq!(normalized, proof);
    }

    #[test]
    fn test_empty_proof_is_unchanged() {
        let key = keccak256(b"empty");
        let normalized = maybe_add_proof_node(key, Vec::new()).unwrap();
        assert!(normalized.is_empty());
    }

    #[test]
    fn test_garbage_node_is_an_error() {
        let key = keccak256(b"garbage");
        let proof = vec![Bytes::from(vec![0x01, 0x02])];
        assert!(maybe_add_proof_node(key, proof).is_err());
    }
}
