pub mod count_min_sketch;
pub mod intrusive_list;
pub mod multi_list;

pub use count_min_sketch::CountMinSketch;
pub use intrusive_list::{IntrusiveList, SlotId};
pub use multi_list::MultiList;
