// Domain models: parsed rounds, per-file metric tables, plot specs and the report index

mod index;
mod plot;
mod round;
mod tables;

pub use index::{GraphEntry, IntervalStats, JsonIndex, RunMetadata};
pub use plot::{PlotScope, PlotSpec, PlotStyle, RenderCommand, Series};
pub use round::{Parsed, Round, SkippedLine};
pub use tables::{
    CgroupMemory, CpuTicks, CpuTimes, KernelCounters, MemInfo, ProcessCommand, ProcessStatus,
    ShmCounts, SlabCache, SmapsCapture, SmapsTotals, XClient,
};
