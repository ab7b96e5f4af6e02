//! Derived-feature formula resolution and evaluation

use crate::error::{Result, WellcastError};
use crate::schema::{Cutoff, DerivedFeature, Formula, Norm};
use std::collections::BTreeMap;

use super::{median_sorted, sorted_copy};

fn column<'a>(cols: &'a BTreeMap<String, Vec<f64>>, name: &str) -> Result<&'a [f64]> {
    cols.get(name)
        .map(|v| v.as_slice())
        .ok_or_else(|| WellcastError::FeatureNotFound(name.to_string()))
}

/// Resolve fit-time statistics inside formulas into fixed constants.
///
/// After resolution a formula can be replayed at prediction time without any
/// access to the fit rows.
pub(crate) fn resolve_formulas(
    derived: &[DerivedFeature],
    cols: &BTreeMap<String, Vec<f64>>,
) -> Result<Vec<DerivedFeature>> {
    derived
        .iter()
        .map(|feature| {
            let formula = match &feature.formula {
                Formula::FlagAbove {
                    col,
                    cutoff: Cutoff::FitMedian,
                } => {
                    let sorted = sorted_copy(column(cols, col)?);
                    Formula::FlagAbove {
                        col: col.clone(),
                        cutoff: Cutoff::Fixed(median_sorted(&sorted)),
                    }
                }
                Formula::Blend { terms } => {
                    let resolved = terms
                        .iter()
                        .map(|term| {
                            let norm = match term.norm {
                                Norm::FitMax => {
                                    let max = column(cols, &term.col)?
                                        .iter()
                                        .copied()
                                        .fold(f64::NEG_INFINITY, f64::max);
                                    Norm::Fixed(if max.is_finite() { max } else { 0.0 })
                                }
                                Norm::Fixed(v) => Norm::Fixed(v),
                            };
                            Ok(crate::schema::BlendTerm {
                                col: term.col.clone(),
                                weight: term.weight,
                                norm,
                            })
                        })
                        .collect::<Result<Vec<_>>>()?;
                    Formula::Blend { terms: resolved }
                }
                other => other.clone(),
            };
            Ok(DerivedFeature {
                name: feature.name.clone(),
                formula,
            })
        })
        .collect()
}

/// Evaluate one resolved formula over the processed numeric columns.
pub(crate) fn compute_feature(
    formula: &Formula,
    cols: &BTreeMap<String, Vec<f64>>,
    n_rows: usize,
) -> Result<Vec<f64>> {
    match formula {
        Formula::Ratio { num, den } => {
            let num = column(cols, num)?;
            let den = column(cols, den)?;
            Ok((0..n_rows)
                .map(|i| if den[i] == 0.0 { 0.0 } else { num[i] / den[i] })
                .collect())
        }
        Formula::Square { col } => {
            let col = column(cols, col)?;
            Ok(col.iter().map(|v| v * v).collect())
        }
        Formula::FlagAbove { col, cutoff } => {
            let cutoff = match cutoff {
                Cutoff::Fixed(v) => *v,
                Cutoff::FitMedian => {
                    return Err(WellcastError::Validation(
                        "FlagAbove cutoff was not resolved at fit time".to_string(),
                    ))
                }
            };
            let col = column(cols, col)?;
            Ok(col
                .iter()
                .map(|&v| if v > cutoff { 1.0 } else { 0.0 })
                .collect())
        }
        Formula::Bucket { col, edges } => {
            let col = column(cols, col)?;
            Ok(col
                .iter()
                .map(|&v| edges.iter().filter(|&&edge| v > edge).count() as f64)
                .collect())
        }
        Formula::Blend { terms } => {
            let mut out = vec![0.0; n_rows];
            for term in terms {
                let norm = match term.norm {
                    Norm::Fixed(v) => v,
                    Norm::FitMax => {
                        return Err(WellcastError::Validation(
                            "Blend normalizer was not resolved at fit time".to_string(),
                        ))
                    }
                };
                let col = column(cols, &term.col)?;
                for (acc, &v) in out.iter_mut().zip(col.iter()) {
                    if norm != 0.0 {
                        *acc += term.weight * v / norm;
                    }
                }
            }
            Ok(out)
        }
        Formula::ComplementProduct {
            col,
            complement_of,
            range,
        } => {
            let col = column(cols, col)?;
            let other = column(cols, complement_of)?;
            Ok((0..n_rows)
                .map(|i| {
                    if *range == 0.0 {
                        0.0
                    } else {
                        col[i] * (range - other[i]) / range
                    }
                })
                .collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::BlendTerm;

    fn cols(pairs: &[(&str, &[f64])]) -> BTreeMap<String, Vec<f64>> {
        pairs
            .iter()
            .map(|(name, values)| (name.to_string(), values.to_vec()))
            .collect()
    }

    #[test]
    fn test_ratio_matches_reference_values() {
        let cols = cols(&[
            ("work_screen_hours", &[7.0]),
            ("screen_time_hours", &[9.5]),
        ]);
        let ratio = compute_feature(
            &Formula::Ratio {
                num: "work_screen_hours".into(),
                den: "screen_time_hours".into(),
            },
            &cols,
            1,
        )
        .unwrap();
        assert!((ratio[0] - 0.7368).abs() < 1e-4);

        let squared = compute_feature(
            &Formula::Square {
                col: "screen_time_hours".into(),
            },
            &cols,
            1,
        )
        .unwrap();
        assert!((squared[0] - 90.25).abs() < 1e-12);
    }

    #[test]
    fn test_ratio_zero_denominator_is_sentinel() {
        let cols = cols(&[("a", &[3.0]), ("b", &[0.0])]);
        let ratio = compute_feature(
            &Formula::Ratio {
                num: "a".into(),
                den: "b".into(),
            },
            &cols,
            1,
        )
        .unwrap();
        assert_eq!(ratio[0], 0.0);
    }

    #[test]
    fn test_bucket_codes() {
        let cols = cols(&[("age", &[22.0, 25.0, 30.0, 40.0, 60.0])]);
        let codes = compute_feature(
            &Formula::Bucket {
                col: "age".into(),
                edges: vec![25.0, 35.0, 45.0],
            },
            &cols,
            5,
        )
        .unwrap();
        assert_eq!(codes, vec![0.0, 0.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_fit_median_resolution() {
        let cols = cols(&[("screen", &[2.0, 4.0, 6.0, 8.0, 10.0])]);
        let derived = vec![DerivedFeature::new(
            "high_screen",
            Formula::FlagAbove {
                col: "screen".into(),
                cutoff: Cutoff::FitMedian,
            },
        )];

        let resolved = resolve_formulas(&derived, &cols).unwrap();
        match &resolved[0].formula {
            Formula::FlagAbove {
                cutoff: Cutoff::Fixed(v),
                ..
            } => assert_eq!(*v, 6.0),
            other => panic!("unexpected formula {other:?}"),
        }

        let flags = compute_feature(&resolved[0].formula, &cols, 5).unwrap();
        assert_eq!(flags, vec![0.0, 0.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn test_blend_resolution_and_eval() {
        let cols = cols(&[("quality", &[5.0]), ("exercise", &[150.0])]);
        let derived = vec![DerivedFeature::new(
            "health",
            Formula::Blend {
                terms: vec![
                    BlendTerm {
                        col: "quality".into(),
                        weight: 0.5,
                        norm: Norm::Fixed(5.0),
                    },
                    BlendTerm {
                        col: "exercise".into(),
                        weight: 0.5,
                        norm: Norm::FitMax,
                    },
                ],
            },
        )];

        let resolved = resolve_formulas(&derived, &cols).unwrap();
        let values = compute_feature(&resolved[0].formula, &cols, 1).unwrap();
        // 0.5 * 5/5 + 0.5 * 150/150
        assert!((values[0] - 1.0).abs() < 1e-12);
    }
}
