use serde_yaml::{Mapping, Value};

/// Merge `src` into `dest`, with `src` taking priority.
///
/// Maps merge key-wise and recursively. Sequences concatenate, destination
/// entries first. Scalars and type mismatches are overridden by the source.
pub fn deep_merge(dest: &mut Value, src: Value) {
    match (dest, src) {
        (Value::Mapping(dest_map), Value::Mapping(src_map)) => {
            merge_mapping(dest_map, src_map);
        }
        (Value::Sequence(dest_seq), Value::Sequence(src_seq)) => {
            dest_seq.extend(src_seq);
        }
        (dest, src) => *dest = src,
    }
}

pub fn merge_mapping(dest: &mut Mapping, src: Mapping) {
    for (key, value) in src {
        match dest.get_mut(&key) {
            Some(existing) => deep_merge(existing, value),
            None => {
                dest.insert(key, value);
            }
        }
    }
}
