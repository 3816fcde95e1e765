//! Small shared containers

mod ref_count_map;

pub use ref_count_map::RefCountMap;
