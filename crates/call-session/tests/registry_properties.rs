//! Property tests for `RenderSurfaceRegistry` over random bind/unbind sequences.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use call_session::errors::RegistryError;
use call_session::registry::{BindingKey, RenderSurfaceRegistry};
use common::types::ParticipantId;
use proptest::prelude::*;
use std::collections::{BTreeMap, HashSet};

#[derive(Debug, Clone)]
enum Op {
    Bind(BindingKey),
    Unbind(BindingKey),
    UnbindAll,
}

fn key() -> impl Strategy<Value = BindingKey> {
    prop_oneof![
        Just(BindingKey::Local),
        (0u32..8).prop_map(|id| BindingKey::Remote(ParticipantId(id))),
    ]
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        6 => key().prop_map(Op::Bind),
        4 => key().prop_map(Op::Unbind),
        1 => Just(Op::UnbindAll),
    ]
}

proptest! {
    #[test]
    fn registry_matches_model(ops in prop::collection::vec(op(), 0..64)) {
        let mut registry = RenderSurfaceRegistry::new();
        let mut model = BTreeMap::new();
        let mut issued = HashSet::new();

        for op in ops {
            match op {
                Op::Bind(key) => {
                    let (handle, created) = registry.bind(key);
                    match model.get(&key) {
                        Some(existing) => {
                            prop_assert!(!created);
                            prop_assert_eq!(*existing, handle);
                        }
                        None => {
                            prop_assert!(created);
                            // Handles are never reused
                            prop_assert!(issued.insert(handle));
                            model.insert(key, handle);
                        }
                    }
                }
                Op::Unbind(key) => {
                    let before = registry.len();
                    match model.remove(&key) {
                        Some(expected) => prop_assert_eq!(registry.unbind(key), Ok(expected)),
                        None => {
                            prop_assert_eq!(registry.unbind(key), Err(RegistryError::NotFound(key)));
                            prop_assert_eq!(registry.len(), before);
                        }
                    }
                }
                Op::UnbindAll => {
                    let released = registry.unbind_all();
                    prop_assert_eq!(released.len(), model.len());
                    prop_assert!(released.windows(2).all(|w| w[0].handle.get() > w[1].handle.get()));
                    model.clear();
                }
            }

            let keys: Vec<BindingKey> = registry.bindings().iter().map(|b| b.key).collect();
            let expected: Vec<BindingKey> = model.keys().copied().collect();
            prop_assert_eq!(keys, expected);
            prop_assert_eq!(registry.is_empty(), model.is_empty());
        }
    }

    #[test]
    fn bind_is_idempotent(id in any::<u32>(), repeats in 1usize..5) {
        let mut registry = RenderSurfaceRegistry::new();
        let (first, created) = registry.bind(ParticipantId(id));
        prop_assert!(created);

        for _ in 0..repeats {
            prop_assert_eq!(registry.bind(ParticipantId(id)), (first, false));
        }
        prop_assert_eq!(registry.len(), 1);
        prop_assert_eq!(
            registry.remote_participants().into_iter().collect::<Vec<_>>(),
            vec![ParticipantId(id)]
        );
    }
}
