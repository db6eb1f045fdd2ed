//! Argument-vector assembly stage

use super::{recv_for, send_for, ArgVector, Rx, Tx};
use crate::cursor::CursorFollower;
use tripwire_core::Value;

/// Assemble one positional vector per cursor.
///
/// Any null element nulls the whole vector. The compiler rejects duplicate
/// and gapped positions; hitting either here is an internal invariant
/// violation and panics.
pub(crate) async fn run_args(
    mut follower: CursorFollower,
    mut parts: Vec<(usize, Rx<Value>)>,
    len: usize,
    out: Tx<ArgVector>,
) {
    while let Some(cursor) = follower.advance().await {
        let mut slots: Vec<Option<Value>> = vec![None; len];
        for (position, rx) in parts.iter_mut() {
            let value = recv_for(rx, &cursor, "args").await;
            let slot = &mut slots[*position];
            if slot.is_some() {
                panic!("args: position {position} written twice (seq {})", cursor.seq);
            }
            *slot = Some(value);
        }

        let mut rendered = Vec::with_capacity(len);
        let mut nulled = false;
        for (position, slot) in slots.into_iter().enumerate() {
            let value = match slot {
                Some(value) => value,
                None => panic!("args: position {position} never written (seq {})", cursor.seq),
            };
            if value.is_null() {
                nulled = true;
                break;
            }
            rendered.push(value.to_arg_string());
        }

        let vector = if nulled { None } else { Some(rendered) };
        send_for(&out, cursor.seq, vector, "args").await;
    }
}
