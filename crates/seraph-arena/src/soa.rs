//! Structure-of-arrays storage: one contiguous arena allocation per field,
//! plus a strided [`Prism`] view for iterating a single field directly.

use crate::arena::Arena;
use crate::capability::Perms;
use seraph_primitives::absence::Sentinel;

/// Size and alignment of one field in a [`Schema`].
#[derive(Debug, Clone, Copy)]
pub struct FieldDescriptor {
    pub size: usize,
    pub align: usize,
}

#[derive(Debug, Clone)]
pub struct Schema {
    pub fields: Vec<FieldDescriptor>,
}

/// A fixed-capacity, column-major array over a [`Schema`], backed by one
/// arena allocation per field.
pub struct SoaArray {
    field_bases: Vec<u64>,
    field_sizes: Vec<usize>,
    capacity: usize,
    count: usize,
    generation: u32,
}

impl SoaArray {
    /// Allocate backing storage for every field; `None` if the arena
    /// cannot satisfy any one of them.
    pub fn create(arena: &mut Arena, schema: &Schema, capacity: usize) -> Option<SoaArray> {
        let mut field_bases = Vec::with_capacity(schema.fields.len());
        for field in &schema.fields {
            let addr = arena.allocate_aligned(field.size * capacity, field.align);
            if addr == u64::ABSENT {
                return None;
            }
            field_bases.push(addr);
        }
        Some(SoaArray {
            field_bases,
            field_sizes: schema.fields.iter().map(|f| f.size).collect(),
            capacity,
            count: 0,
            generation: arena.generation(),
        })
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.count
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Append one record; `elem[i]` must be exactly `field_sizes[i]` bytes.
    /// Fails if the array is full or the arena has since been reset.
    pub fn push(&mut self, arena: &mut Arena, elem: &[&[u8]]) -> bool {
        if self.count >= self.capacity || arena.generation() != self.generation || elem.len() != self.field_bases.len() {
            return false;
        }
        for (i, bytes) in elem.iter().enumerate() {
            if bytes.len() != self.field_sizes[i] {
                return false;
            }
        }
        for (i, bytes) in elem.iter().enumerate() {
            let start = self.field_bases[i] as usize + self.field_sizes[i] * self.count;
            arena.memory_mut()[start..start + self.field_sizes[i]].copy_from_slice(bytes);
        }
        self.count += 1;
        true
    }

    /// Gather one record's fields; `None` if `index` is out of bounds or
    /// the arena has since been reset.
    #[must_use]
    pub fn get(&self, arena: &Arena, index: usize) -> Option<Vec<Vec<u8>>> {
        if index >= self.count || arena.generation() != self.generation {
            return None;
        }
        let mut out = Vec::with_capacity(self.field_bases.len());
        for (i, &base) in self.field_bases.iter().enumerate() {
            let start = base as usize + self.field_sizes[i] * index;
            out.push(arena.memory()[start..start + self.field_sizes[i]].to_vec());
        }
        Some(out)
    }

    /// Overwrite one record's fields in place.
    pub fn set(&self, arena: &mut Arena, index: usize, elem: &[&[u8]]) -> bool {
        if index >= self.count || arena.generation() != self.generation || elem.len() != self.field_bases.len() {
            return false;
        }
        for (i, &base) in self.field_bases.iter().enumerate() {
            let start = base as usize + self.field_sizes[i] * index;
            arena.memory_mut()[start..start + self.field_sizes[i]].copy_from_slice(elem[i]);
        }
        true
    }

    /// A strided view over a single field, suitable for a scan that never
    /// touches the other columns.
    #[must_use]
    pub fn prism(&self, field_idx: usize, perms: Perms) -> Prism {
        let stride = self.field_sizes[field_idx] as u64;
        Prism {
            base: self.field_bases[field_idx],
            stride,
            element_size: stride,
            count: self.count as u64,
            generation: self.generation,
            perms,
        }
    }
}

/// A strided, permissioned view into one SoA column.
#[derive(Debug, Clone, Copy)]
pub struct Prism {
    pub base: u64,
    pub stride: u64,
    pub element_size: u64,
    pub count: u64,
    pub generation: u32,
    pub perms: Perms,
}

impl Prism {
    /// Byte offset of element `index`, or `None` if out of range.
    #[must_use]
    pub fn element_offset(&self, index: u64) -> Option<u64> {
        if index >= self.count {
            return None;
        }
        Some(self.base + index * self.stride)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::ArenaFlags;

    fn schema() -> Schema {
        Schema {
            fields: vec![
                FieldDescriptor { size: 4, align: 4 },
                FieldDescriptor { size: 8, align: 8 },
            ],
        }
    }

    #[test]
    fn push_then_get_roundtrips_each_field() {
        let mut arena = Arena::create(1024, 8, ArenaFlags::default());
        let mut soa = SoaArray::create(&mut arena, &schema(), 4).unwrap();
        let id = 7u32.to_le_bytes();
        let score = 42u64.to_le_bytes();
        assert!(soa.push(&mut arena, &[&id, &score]));
        let record = soa.get(&arena, 0).unwrap();
        assert_eq!(record[0], id);
        assert_eq!(record[1], score);
    }

    #[test]
    fn push_past_capacity_fails() {
        let mut arena = Arena::create(1024, 8, ArenaFlags::default());
        let mut soa = SoaArray::create(&mut arena, &schema(), 1).unwrap();
        let zero4 = [0u8; 4];
        let zero8 = [0u8; 8];
        assert!(soa.push(&mut arena, &[&zero4, &zero8]));
        assert!(!soa.push(&mut arena, &[&zero4, &zero8]));
    }

    #[test]
    fn reset_arena_invalidates_subsequent_access() {
        let mut arena = Arena::create(1024, 8, ArenaFlags::default());
        let soa = SoaArray::create(&mut arena, &schema(), 4).unwrap();
        arena.reset();
        assert!(soa.get(&arena, 0).is_none());
    }

    #[test]
    fn prism_element_offset_is_strided() {
        let mut arena = Arena::create(1024, 8, ArenaFlags::default());
        let mut soa = SoaArray::create(&mut arena, &schema(), 4).unwrap();
        let a = 1u32.to_le_bytes();
        let b = 2u64.to_le_bytes();
        soa.push(&mut arena, &[&a, &b]);
        soa.push(&mut arena, &[&a, &b]);
        let prism = soa.prism(1, Perms::READ);
        assert_eq!(prism.element_offset(0), Some(prism.base));
        assert_eq!(prism.element_offset(1), Some(prism.base + 8));
        assert_eq!(prism.element_offset(2), None);
    }
}
