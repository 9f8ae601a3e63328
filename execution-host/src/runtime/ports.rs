use std::{collections::HashSet, ops::RangeInclusive};

pub type Port = u16;

/// Hands out control ports for spawned instances from a fixed range.
#[derive(Debug, Clone)]
pub struct PortAllocator {
    range: RangeInclusive<Port>,
    used_ports: HashSet<Port>,
}

impl PortAllocator {
    pub fn new(start: Port, end: Port) -> Self {
        Self {
            range: start..=end,
            used_ports: HashSet::new(),
        }
    }

    pub fn allocate(&mut self) -> Option<Port> {
        for port in self.range.clone() {
            if !self.used_ports.contains(&port) {
                self.used_ports.insert(port);
                return Some(port);
            }
        }
        None
    }

    pub fn release(&mut self, port: Port) {
        self.used_ports.remove(&port);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocates_released_ports_again() {
        let mut allocator = PortAllocator::new(6000, 6001);
        assert_eq!(allocator.allocate(), Some(6000));
        assert_eq!(allocator.allocate(), Some(6001));
        assert_eq!(allocator.allocate(), None);

        allocator.release(6000);
        assert_eq!(allocator.allocate(), Some(6000));
    }
}
