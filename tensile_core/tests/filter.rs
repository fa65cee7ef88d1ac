use rstest::rstest;
use tensile_core::ForceFilter;

fn run(filter: &mut ForceFilter, inputs: &[f64]) -> Vec<f64> {
    inputs.iter().map(|&s| filter.process(s)).collect()
}

#[rstest]
#[case::confirmed_jump(&[0.0, 0.0, 20.0, 21.0], &[0.0, 0.0, 0.0, 20.5])]
#[case::unconfirmed_jump_reverts(&[0.0, 20.0, 5.0], &[0.0, 0.0, 0.0])]
#[case::small_steps_pass(&[1.0, 5.0, 12.0, 26.0], &[1.0, 5.0, 12.0, 26.0])]
#[case::jump_down_confirmed(&[40.0, 10.0, 11.0], &[40.0, 40.0, 10.5])]
#[case::threshold_is_inclusive(&[0.0, 15.0], &[0.0, 15.0])]
#[case::tolerance_is_inclusive(&[0.0, 30.0, 32.0], &[0.0, 0.0, 31.0])]
fn debounce_sequences(#[case] inputs: &[f64], #[case] expected: &[f64]) {
    let mut f = ForceFilter::new(15.0, 2.0);
    assert_eq!(run(&mut f, inputs), expected);
}

#[test]
fn spike_then_return_leaves_baseline() {
    let mut f = ForceFilter::new(15.0, 2.0);
    // single-sample spike, then normal readings
    let out = run(&mut f, &[10.0, 90.0, 10.5, 11.0]);
    assert_eq!(out, vec![10.0, 10.0, 10.0, 11.0]);
    assert!(!f.has_pending());
}

#[test]
fn confirmed_average_becomes_new_baseline() {
    let mut f = ForceFilter::new(15.0, 2.0);
    run(&mut f, &[0.0, 50.0, 51.0]);
    assert_eq!(f.last_accepted(), Some(50.5));
    // small move relative to the new baseline passes straight through
    assert_eq!(f.process(55.0), 55.0);
}
