/// Placeholder sample source. A deployment wires an ADC channel or sensor
/// driver in here; the streaming path does not care where the value comes
/// from.
pub(crate) fn next_sample() -> i32 {
    123
}
