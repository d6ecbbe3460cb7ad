pub mod macros;
pub mod observation;
pub mod target;
pub mod time;

pub use observation::*;
pub use target::*;
pub use time::*;

crate::define_id_type!(i64, TargetId);
crate::define_id_type!(i64, ObservationGroupId);
crate::define_id_type!(i64, ObservationRecordId);
crate::define_id_type!(i64, DynamicCadenceId);
crate::define_id_type!(i64, ReducedDatumId);
