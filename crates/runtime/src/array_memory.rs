//! Array memory manager (§4.L): an optional collaborator for externally
//! managed, contiguous flat arrays. Fixed-capacity handle table with
//! linear-probe lookup by name, matching the original's 64-slot table. It
//! does not participate in the main `Variable` store.

use cb_core::error::{CbError, CbResult};
use cb_core::types::TypeInfo;

const CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub struct ArrayHandle {
    pub name: String,
    pub element_type: TypeInfo,
    pub dimensions: Vec<usize>,
    pub block: Vec<i64>,
    pub in_use: bool,
}

impl ArrayHandle {
    fn row_major_index(&self, indices: &[usize]) -> Option<usize> {
        if indices.len() != self.dimensions.len() {
            return None;
        }
        let mut flat = 0usize;
        for (idx, dim) in indices.iter().zip(self.dimensions.iter()) {
            if *idx >= *dim {
                return None;
            }
            flat = flat * dim + idx;
        }
        Some(flat)
    }
}

pub struct ArrayMemoryManager {
    slots: Vec<Option<ArrayHandle>>,
}

impl Default for ArrayMemoryManager {
    fn default() -> Self {
        ArrayMemoryManager::new()
    }
}

impl ArrayMemoryManager {
    pub fn new() -> Self {
        ArrayMemoryManager {
            slots: (0..CAPACITY).map(|_| None).collect(),
        }
    }

    fn find_free_slot(&self) -> Option<usize> {
        self.slots.iter().position(|s| s.is_none())
    }

    fn find_slot_by_name(&self, name: &str) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| matches!(s, Some(h) if h.in_use && h.name == name))
    }

    fn create_array(&mut self, name: &str, element_type: TypeInfo, dims: Vec<usize>) -> CbResult<()> {
        if self.find_slot_by_name(name).is_some() {
            return Err(CbError::declaration(format!("array '{name}' already allocated")));
        }
        let total: usize = dims.iter().product();
        let slot = self
            .find_free_slot()
            .ok_or_else(|| CbError::resource("array memory manager is at capacity (64 handles)"))?;
        self.slots[slot] = Some(ArrayHandle {
            name: name.to_string(),
            element_type,
            dimensions: dims,
            block: vec![0; total],
            in_use: true,
        });
        Ok(())
    }

    pub fn create_array_1d(&mut self, name: &str, element_type: TypeInfo, size: usize) -> CbResult<()> {
        self.create_array(name, element_type, vec![size])
    }

    pub fn create_array_2d(&mut self, name: &str, element_type: TypeInfo, rows: usize, cols: usize) -> CbResult<()> {
        self.create_array(name, element_type, vec![rows, cols])
    }

    pub fn create_array_3d(
        &mut self,
        name: &str,
        element_type: TypeInfo,
        d0: usize,
        d1: usize,
        d2: usize,
    ) -> CbResult<()> {
        self.create_array(name, element_type, vec![d0, d1, d2])
    }

    pub fn destroy_array(&mut self, name: &str) -> CbResult<()> {
        let slot = self
            .find_slot_by_name(name)
            .ok_or_else(|| CbError::access(format!("no such array handle '{name}'")))?;
        self.slots[slot] = None;
        Ok(())
    }

    pub fn get(&self, name: &str, indices: &[usize]) -> CbResult<i64> {
        let slot = self
            .find_slot_by_name(name)
            .ok_or_else(|| CbError::access(format!("no such array handle '{name}'")))?;
        let handle = self.slots[slot].as_ref().unwrap();
        let flat = handle
            .row_major_index(indices)
            .ok_or_else(|| CbError::access("array index out of bounds".to_string()))?;
        Ok(handle.block[flat])
    }

    pub fn set(&mut self, name: &str, indices: &[usize], value: i64) -> CbResult<()> {
        let slot = self
            .find_slot_by_name(name)
            .ok_or_else(|| CbError::access(format!("no such array handle '{name}'")))?;
        let handle = self.slots[slot].as_mut().unwrap();
        let flat = handle
            .row_major_index(indices)
            .ok_or_else(|| CbError::access("array index out of bounds".to_string()))?;
        handle.block[flat] = value;
        Ok(())
    }
}
