//! Arithmetic in GF(2^8) modulo x^8 + x^4 + x^3 + x + 1
//!
//! Multiplication runs a fixed eight iterations with masks instead of
//! branches on secret data.

pub fn add(a: u8, b: u8) -> u8 {
    a ^ b
}

pub fn mul(mut a: u8, mut b: u8) -> u8 {
    let mut product = 0u8;
    for _ in 0..8 {
        product ^= a & 0u8.wrapping_sub(b & 1);
        let carry = 0u8.wrapping_sub(a >> 7);
        a = (a << 1) ^ (0x1b & carry);
        b >>= 1;
    }
    product
}

/// Multiplicative inverse; `inv(0)` is 0
pub fn inv(a: u8) -> u8 {
    // a^254 = a^-1 since the multiplicative group has order 255
    let mut result = 1u8;
    let mut base = a;
    let mut exp = 254u8;
    while exp > 0 {
        if exp & 1 == 1 {
            result = mul(result, base);
        }
        base = mul(base, base);
        exp >>= 1;
    }
    result
}

/// `a / b`; callers guarantee `b != 0`
pub fn div(a: u8, b: u8) -> u8 {
    mul(a, inv(b))
}

/// Evaluate the polynomial with `coefficients` (constant term first) at `x`
pub fn evaluate(coefficients: &[u8], x: u8) -> u8 {
    coefficients
        .iter()
        .rev()
        .fold(0u8, |acc, &c| add(mul(acc, x), c))
}

/// Lagrange interpolation of the points `(xs[i], ys[i])` at `x = 0`
///
/// `xs` must be distinct and non-zero.
pub fn interpolate_at_zero(xs: &[u8], ys: &[u8]) -> u8 {
    let mut result = 0u8;
    for (i, (&xi, &yi)) in xs.iter().zip(ys).enumerate() {
        let mut basis = 1u8;
        for (j, &xj) in xs.iter().enumerate() {
            if i != j {
                // (0 - xj) / (xi - xj), subtraction is xor
                basis = mul(basis, div(xj, add(xi, xj)));
            }
        }
        result = add(result, mul(yi, basis));
    }
    result
}
