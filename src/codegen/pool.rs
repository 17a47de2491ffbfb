use ordered_float::OrderedFloat;
use rustc_hash::FxHashMap;

/// Module-wide pool of float literals, one entry per distinct value.
#[derive(Debug, Default)]
pub struct LiteralPool {
    values: Vec<f64>,
    indices: FxHashMap<OrderedFloat<f64>, usize>,
}

impl LiteralPool {
    pub fn intern(&mut self, value: f64) -> usize {
        *self.indices.entry(OrderedFloat(value)).or_insert_with(|| {
            self.values.push(value);
            self.values.len() - 1
        })
    }

    pub fn label(index: usize) -> String {
        format!(".LCF{index}")
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Labels and data directives in first-use order.
    pub fn entries(&self) -> impl Iterator<Item = (String, String)> + '_ {
        self.values
            .iter()
            .enumerate()
            .map(|(index, &value)| (Self::label(index), directive(value)))
    }
}

fn directive(value: f64) -> String {
    let single = value as f32;
    if single.is_finite() {
        format!(".float {single:?}")
    } else {
        format!(".long {:#010x}", single.to_bits())
    }
}

#[cfg(test)]
mod tests {
    use super::LiteralPool;

    #[test]
    fn equal_values_share_an_entry() {
        let mut pool = LiteralPool::default();
        assert_eq!(pool.intern(1.5), 0);
        assert_eq!(pool.intern(2.0), 1);
        assert_eq!(pool.intern(1.5), 0);
        assert_eq!(
            pool.entries().collect::<Vec<_>>(),
            vec![
                (".LCF0".to_owned(), ".float 1.5".to_owned()),
                (".LCF1".to_owned(), ".float 2.0".to_owned()),
            ]
        );
    }

    #[test]
    fn non_finite_values_are_emitted_as_bits() {
        let mut pool = LiteralPool::default();
        pool.intern(f64::INFINITY);
        assert_eq!(
            pool.entries().collect::<Vec<_>>(),
            vec![(".LCF0".to_owned(), ".long 0x7f800000".to_owned())]
        );
    }
}
