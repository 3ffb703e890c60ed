use std::hint::black_box;
use std::time::{Duration, Instant};

use lookbound_engine::PositionOracle;

use super::verify::{ContractViolation, Verifier};
use crate::metrics::PassTiming;
use crate::workload::{Payload, QueryWorkload};

/// Run one timed pass of `workload` through `oracle`.
///
/// Every query is resolved and verified inside the timed region; the first
/// mismatch aborts the pass. The running checksum feeds `black_box` so the
/// loop body stays observable to the optimizer.
pub fn timed_pass<T: Payload, O: PositionOracle + ?Sized>(
    verifier: &Verifier<'_, T>,
    oracle: &O,
    workload: &QueryWorkload,
) -> Result<PassTiming, ContractViolation> {
    let queries = workload.queries();
    let mut checksum = 0u64;

    let start = Instant::now();
    for query in queries {
        let result = verifier.check(oracle, black_box(query))?;
        checksum = checksum.wrapping_add(result);
    }
    let elapsed = start.elapsed();
    black_box(checksum);

    Ok(PassTiming {
        oracle: oracle.name().to_string(),
        queries: queries.len(),
        elapsed: elapsed.max(Duration::from_nanos(1)),
        checksum,
    })
}
