//! Classical fourth-order Runge–Kutta on plain vectors.
//!
//! Used to check transcribed trajectories against the continuous dynamics,
//! never by the solver itself.

/// One RK4 step of `ẋ = f(x, u)` over `dt`, holding `u` constant.
pub fn rk4_step<F>(f: &F, x: &[f64], u: &[f64], dt: f64) -> Vec<f64>
where
    F: Fn(&[f64], &[f64]) -> Vec<f64>,
{
    let shifted = |k: &[f64], h: f64| -> Vec<f64> { x.iter().zip(k).map(|(xi, ki)| xi + h * ki).collect() };

    let k1 = f(x, u);
    let k2 = f(&shifted(&k1, dt / 2.0), u);
    let k3 = f(&shifted(&k2, dt / 2.0), u);
    let k4 = f(&shifted(&k3, dt), u);

    (0..x.len())
        .map(|i| x[i] + dt / 6.0 * (k1[i] + 2.0 * k2[i] + 2.0 * k3[i] + k4[i]))
        .collect()
}

/// Integrate from `x0` under the piecewise-constant inputs `us`, one step
/// of `dt` per input. Returns every state including `x0`.
pub fn rk4<F>(f: F, x0: &[f64], us: &[Vec<f64>], dt: f64) -> Vec<Vec<f64>>
where
    F: Fn(&[f64], &[f64]) -> Vec<f64>,
{
    let mut states = Vec::with_capacity(us.len() + 1);
    states.push(x0.to_vec());
    for u in us {
        let next = match states.last() {
            Some(x) => rk4_step(&f, x, u, dt),
            None => break,
        };
        states.push(next);
    }
    states
}
