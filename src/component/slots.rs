// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Bookkeeping of the output buffers and of who may use each of them.

use std::collections::BTreeMap;

use vda::decode::PictureBuffer;
use vda::PixelFormat;

use crate::allocator::GraphicBlock;
use crate::error::Error;
use crate::error::Result;

/// Who currently holds a frame slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Owner {
    /// Idle, waiting to be given to the accelerator.
    Component,
    /// Given to the accelerator to decode into.
    Accelerator,
    /// Holds a decoded picture that the client has not released yet.
    Client,
}

impl Owner {
    fn can_become(self, to: Owner) -> bool {
        use Owner::*;
        matches!(
            (self, to),
            (Component, Accelerator) | (Accelerator, Client) | (Client, Component)
        )
    }
}

/// One output buffer.
///
/// The registry holds the graphic block except while the slot is owned by the client, in which
/// case the block travels with the decoded picture.
#[derive(Debug)]
pub struct FrameSlot {
    id: i32,
    owner: Owner,
    block: Option<GraphicBlock>,
}

impl FrameSlot {
    pub fn owner(&self) -> Owner {
        self.owner
    }

    pub fn block(&self) -> Option<&GraphicBlock> {
        self.block.as_ref()
    }

    /// Describes the slot for importing it into the accelerator.
    pub fn picture_buffer(&self, format: PixelFormat) -> Option<PictureBuffer> {
        self.block().map(|block| PictureBuffer {
            id: self.id,
            format,
            handle: block.handle(),
            planes: block.planes().to_vec(),
        })
    }
}

#[derive(Debug, Default)]
pub struct FrameSlotRegistry {
    slots: BTreeMap<i32, FrameSlot>,
    next_id: i32,
    // Bumped every time the whole set is dropped, so that late messages about former slots can be
    // told apart from messages about the current ones.
    generation: u32,
}

impl FrameSlotRegistry {
    pub fn new() -> Self {
        Default::default()
    }

    /// Adds a Component-owned slot for `block` and returns its id.
    pub fn register(&mut self, block: GraphicBlock) -> i32 {
        let id = self.next_id;
        self.next_id += 1;
        self.slots.insert(
            id,
            FrameSlot {
                id,
                owner: Owner::Component,
                block: Some(block),
            },
        );
        id
    }

    pub fn find(&self, id: i32) -> Result<&FrameSlot> {
        self.slots.get(&id).ok_or(Error::InvalidSlot(id))
    }

    fn find_mut(&mut self, id: i32) -> Result<&mut FrameSlot> {
        self.slots.get_mut(&id).ok_or(Error::InvalidSlot(id))
    }

    /// Moves slot `id` to `owner`. Only Component -> Accelerator -> Client -> Component is
    /// allowed.
    pub fn set_owner(&mut self, id: i32, owner: Owner) -> Result<()> {
        let slot = self.find_mut(id)?;
        if !slot.owner.can_become(owner) {
            return Err(Error::IllegalTransition {
                id,
                from: slot.owner,
                to: owner,
            });
        }
        slot.owner = owner;
        Ok(())
    }

    /// Hands the block of an Accelerator-owned slot over to the client.
    pub fn release_to_client(&mut self, id: i32) -> Result<GraphicBlock> {
        self.set_owner(id, Owner::Client)?;
        let slot = self.find_mut(id)?;
        slot.block.take().ok_or(Error::InvalidSlot(id))
    }

    /// Takes back the block of a Client-owned slot.
    pub fn reclaim_from_client(&mut self, id: i32, block: GraphicBlock) -> Result<()> {
        self.set_owner(id, Owner::Component)?;
        self.find_mut(id)?.block = Some(block);
        Ok(())
    }

    /// Marks slot `id` as dismissed by the accelerator.
    pub fn dismiss(&mut self, id: i32) -> Result<()> {
        let slot = self.find_mut(id)?;
        if slot.owner != Owner::Accelerator {
            return Err(Error::IllegalTransition {
                id,
                from: slot.owner,
                to: Owner::Component,
            });
        }
        slot.owner = Owner::Component;
        Ok(())
    }

    /// Marks every Accelerator-owned slot as dismissed. Returns how many there were.
    pub fn dismiss_all(&mut self) -> usize {
        let mut count = 0;
        for slot in self.slots.values_mut() {
            if slot.owner == Owner::Accelerator {
                slot.owner = Owner::Component;
                count += 1;
            }
        }
        count
    }

    /// Forgets the slots whose block is held by the client. Their block is dropped when the
    /// client releases it.
    pub fn detach_client_owned(&mut self) -> usize {
        let before = self.slots.len();
        self.slots.retain(|_, slot| slot.owner != Owner::Client);
        before - self.slots.len()
    }

    /// Drops all slots and starts a new generation.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.next_id = 0;
        self.generation = self.generation.wrapping_add(1);
    }

    pub fn count_by_owner(&self, owner: Owner) -> usize {
        self.slots.values().filter(|s| s.owner == owner).count()
    }

    /// Whether no slot is held by the accelerator or the client. True for an empty set.
    pub fn all_owned_by_component(&self) -> bool {
        self.slots.values().all(|s| s.owner == Owner::Component)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn ids(&self) -> Vec<i32> {
        self.slots.keys().copied().collect()
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

#[cfg(test)]
mod tests {
    use vda::BufferHandle;

    use super::*;
    use crate::format::Size;

    fn block(n: u64) -> GraphicBlock {
        GraphicBlock::new(
            BufferHandle(n),
            Size::new(320, 240),
            PixelFormat::NV12,
            PixelFormat::NV12.plane_layout(320, 240),
        )
    }

    fn assert_counts_consistent(slots: &FrameSlotRegistry) {
        assert_eq!(
            slots.count_by_owner(Owner::Component)
                + slots.count_by_owner(Owner::Accelerator)
                + slots.count_by_owner(Owner::Client),
            slots.len()
        );
    }

    #[test]
    fn register_assigns_sequential_ids() {
        let mut slots = FrameSlotRegistry::new();
        assert_eq!(slots.register(block(10)), 0);
        assert_eq!(slots.register(block(11)), 1);
        let slot = slots.find(1).unwrap();
        assert_eq!(slot.owner(), Owner::Component);
        assert_eq!(slot.block().unwrap().handle(), BufferHandle(11));
    }

    #[test]
    fn unknown_slot() {
        let mut slots = FrameSlotRegistry::new();
        assert!(matches!(slots.find(3), Err(Error::InvalidSlot(3))));
        assert!(matches!(
            slots.set_owner(3, Owner::Accelerator),
            Err(Error::InvalidSlot(3))
        ));
    }

    #[test]
    fn full_ownership_cycle() {
        let mut slots = FrameSlotRegistry::new();
        let id = slots.register(block(0));

        slots.set_owner(id, Owner::Accelerator).unwrap();
        let picture = slots
            .find(id)
            .unwrap()
            .picture_buffer(PixelFormat::NV12)
            .unwrap();
        assert_eq!(picture.id, id);
        assert_eq!(picture.handle, BufferHandle(0));

        let b = slots.release_to_client(id).unwrap();
        assert_eq!(slots.find(id).unwrap().owner(), Owner::Client);
        assert!(slots.find(id).unwrap().block().is_none());

        slots.reclaim_from_client(id, b).unwrap();
        assert_eq!(slots.find(id).unwrap().owner(), Owner::Component);
        assert!(slots.find(id).unwrap().block().is_some());
    }

    #[test]
    fn illegal_transitions() {
        let mut slots = FrameSlotRegistry::new();
        let id = slots.register(block(0));

        assert!(matches!(
            slots.set_owner(id, Owner::Client),
            Err(Error::IllegalTransition {
                from: Owner::Component,
                to: Owner::Client,
                ..
            })
        ));
        assert!(slots.release_to_client(id).is_err());
        slots.set_owner(id, Owner::Accelerator).unwrap();
        assert!(slots.set_owner(id, Owner::Accelerator).is_err());
        assert!(slots.reclaim_from_client(id, block(0)).is_err());
        assert_eq!(slots.find(id).unwrap().owner(), Owner::Accelerator);
    }

    #[test]
    fn counts_stay_consistent() {
        let mut slots = FrameSlotRegistry::new();
        for n in 0..6 {
            slots.register(block(n));
        }
        assert_counts_consistent(&slots);

        let mut held = Vec::new();
        for round in 0..4 {
            for id in slots.ids() {
                let owner = slots.find(id).unwrap().owner();
                match owner {
                    Owner::Component => slots.set_owner(id, Owner::Accelerator).unwrap(),
                    Owner::Accelerator if (id + round) % 2 == 0 => {
                        held.push((id, slots.release_to_client(id).unwrap()))
                    }
                    Owner::Accelerator => (),
                    Owner::Client => (),
                }
                assert_counts_consistent(&slots);
            }
            for (id, b) in held.drain(..) {
                slots.reclaim_from_client(id, b).unwrap();
                assert_counts_consistent(&slots);
            }
        }
        assert_eq!(slots.len(), 6);
    }

    #[test]
    fn dismissal_and_detach() {
        let mut slots = FrameSlotRegistry::new();
        for n in 0..4 {
            let id = slots.register(block(n));
            slots.set_owner(id, Owner::Accelerator).unwrap();
        }
        let _held = slots.release_to_client(0).unwrap();
        assert!(!slots.all_owned_by_component());

        slots.dismiss(1).unwrap();
        assert!(slots.dismiss(1).is_err());
        assert_eq!(slots.dismiss_all(), 2);
        assert_eq!(slots.count_by_owner(Owner::Accelerator), 0);
        assert!(!slots.all_owned_by_component());

        assert_eq!(slots.detach_client_owned(), 1);
        assert!(slots.all_owned_by_component());
        assert_eq!(slots.len(), 3);
        assert!(matches!(slots.find(0), Err(Error::InvalidSlot(0))));
    }

    #[test]
    fn clear_starts_new_generation() {
        let mut slots = FrameSlotRegistry::new();
        slots.register(block(0));
        let generation = slots.generation();
        slots.clear();
        assert!(slots.is_empty());
        assert!(slots.all_owned_by_component());
        assert_ne!(slots.generation(), generation);
        assert_eq!(slots.register(block(1)), 0);
    }
}
