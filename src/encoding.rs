//! Packed integer encodings shared by every planning component.
//!
//! * A variable-value pair is a `u32`: `(var << 16) | value`. Both halves must
//!   fit in 16 bits, so a task is limited to 65,536 variables and values.
//! * Every plan step owns two time points: `step * 2` (start) and
//!   `step * 2 + 1` (end). Step 0 is the fictitious initial action, so points
//!   0 and 1 always exist.
//! * An ordering `p1 -> p2` between two time points is a `u32`:
//!   `(p2 << 16) | p1`.
//! * A mutex between two variable-value codes is a `u64`:
//!   `(vv1 << 32) | vv2`.

/// Minimum gap between two ordered time points.
pub const EPSILON: f64 = 0.002;

/// Literal or action level that the relaxed graph never reached.
pub const UNREACHED: i32 = i32::MAX;

/// Heuristic value of an unreachable goal set.
pub const H_INFINITY: u16 = u16::MAX;

/// Function index of values that do not come from any predicate or function.
pub const FICTITIOUS_FUNCTION: u32 = u32::MAX;

pub type VarValue = u32;
pub type TimePoint = u16;
pub type Ordering = u32;

pub const MAX_ENCODED: usize = 1 << 16;

#[inline]
pub fn var_value(var: usize, value: usize) -> VarValue {
    debug_assert!(var < MAX_ENCODED && value < MAX_ENCODED);
    ((var as u32) << 16) | value as u32
}

#[inline]
pub fn var_of(vv: VarValue) -> usize {
    (vv >> 16) as usize
}

#[inline]
pub fn value_of(vv: VarValue) -> usize {
    (vv & 0xFFFF) as usize
}

#[inline]
pub fn start_point(step: usize) -> TimePoint {
    debug_assert!(step * 2 + 1 < MAX_ENCODED);
    (step << 1) as TimePoint
}

#[inline]
pub fn end_point(step: usize) -> TimePoint {
    start_point(step) + 1
}

#[inline]
pub fn step_of(point: TimePoint) -> usize {
    (point >> 1) as usize
}

#[inline]
pub fn is_start(point: TimePoint) -> bool {
    point & 1 == 0
}

#[inline]
pub fn ordering(p1: TimePoint, p2: TimePoint) -> Ordering {
    ((p2 as u32) << 16) | p1 as u32
}

#[inline]
pub fn first_point(o: Ordering) -> TimePoint {
    (o & 0xFFFF) as TimePoint
}

#[inline]
pub fn second_point(o: Ordering) -> TimePoint {
    (o >> 16) as TimePoint
}

#[inline]
pub fn mutex_code(vv1: VarValue, vv2: VarValue) -> u64 {
    ((vv1 as u64) << 32) | vv2 as u64
}

#[inline]
pub fn action_pair_code(a1: usize, a2: usize) -> u64 {
    ((a1 as u64) << 32) | a2 as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_var_value_layout() {
        let vv = var_value(3, 7);
        assert_eq!(vv, (3 << 16) | 7);
        assert_eq!(var_of(vv), 3);
        assert_eq!(value_of(vv), 7);
        assert_eq!(var_of(var_value(65_535, 65_535)), 65_535);
    }

    #[test]
    fn test_time_points() {
        assert_eq!(start_point(0), 0);
        assert_eq!(end_point(0), 1);
        assert_eq!(start_point(5), 10);
        assert_eq!(step_of(11), 5);
        assert!(is_start(10));
        assert!(!is_start(11));
    }

    #[test]
    fn test_ordering_layout() {
        let o = ordering(3, 8);
        assert_eq!(o, (8 << 16) | 3);
        assert_eq!(first_point(o), 3);
        assert_eq!(second_point(o), 8);
    }

    #[test]
    fn test_mutex_code_is_directional() {
        let a = var_value(1, 2);
        let b = var_value(4, 0);
        assert_ne!(mutex_code(a, b), mutex_code(b, a));
        assert_eq!(mutex_code(a, b) >> 32, a as u64);
    }
}
