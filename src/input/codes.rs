use crate::input::InputError;
use crate::model::GeneCodes;

const MAX_DEGREE: u32 = 20;

/// Code books hold one decimal digit per round.
pub const MAX_CODE_DYES: usize = 10;

/// Generates `n_genes` codes from the lowest-degree polynomial that can
/// produce enough of them. Gene `i` is named `gene_{i}` and its dye in round
/// `r` is `Σ_j coef_j · r^j mod n_channels`.
///
/// Coefficient sets that only differ in the constant term would give a code
/// constant across rounds (a background code), so they are skipped.
pub fn reed_solomon_codes(
    n_genes: usize,
    n_rounds: usize,
    n_channels: usize,
) -> Result<GeneCodes, InputError> {
    if n_rounds < 2 {
        return Err(InputError::InvalidInput("require at least two rounds".to_string()));
    }
    if n_channels < 2 {
        return Err(InputError::InvalidInput(
            "require at least two channels".to_string(),
        ));
    }
    if n_channels > MAX_CODE_DYES {
        return Err(InputError::InvalidInput(format!(
            "code books hold at most {} dyes per round, got {} channels",
            MAX_CODE_DYES, n_channels
        )));
    }
    if n_genes == 0 {
        return Err(InputError::InvalidInput("require at least one gene".to_string()));
    }

    let mut degree = 0u32;
    loop {
        let max_unique = (n_rounds as i128).pow(degree) - n_rounds as i128;
        if max_unique >= n_genes as i128 {
            break;
        }
        degree += 1;
        if degree == MAX_DEGREE {
            return Err(InputError::InvalidInput(
                "polynomial degree required is too large for generating the gene codes"
                    .to_string(),
            ));
        }
    }

    let n_coef = degree as usize + 1;
    let mut coefs = vec![0usize; n_coef];
    let mut names = Vec::with_capacity(n_genes);
    let mut codes = Vec::with_capacity(n_genes);
    for g in 0..n_genes {
        loop {
            if !increment(&mut coefs, n_channels) {
                return Err(exhausted(n_genes, n_rounds));
            }
            if coefs[1..].iter().any(|&c| c != 0) {
                break;
            }
        }
        let code: Vec<u8> = (0..n_rounds)
            .map(|r| {
                let mut value = 0u128;
                let mut power = 1u128;
                for &c in &coefs {
                    value = (value + c as u128 * power) % n_channels as u128;
                    power = power * r as u128 % n_channels as u128;
                }
                value as u8
            })
            .collect();
        names.push(format!("gene_{}", g));
        codes.push(code);
    }

    let mut sorted = codes.clone();
    sorted.sort();
    sorted.dedup();
    if sorted.len() != codes.len() {
        return Err(exhausted(n_genes, n_rounds));
    }
    Ok(GeneCodes { names, codes })
}

/// Base-`n_channels` increment; false once every coefficient wrapped.
fn increment(coefs: &mut [usize], n_channels: usize) -> bool {
    for c in coefs.iter_mut() {
        *c += 1;
        if *c < n_channels {
            return true;
        }
        *c = 0;
    }
    false
}

fn exhausted(n_genes: usize, n_rounds: usize) -> InputError {
    InputError::InvalidInput(format!(
        "could not generate {} unique gene codes with {} rounds; \
         decrease the number of genes or increase the number of rounds",
        n_genes, n_rounds
    ))
}
