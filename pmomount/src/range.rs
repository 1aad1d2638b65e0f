//! En-tête `Range` à plage unique (`bytes=a-b`, `bytes=a-`, `bytes=-n`).

/// Résultat de l'analyse d'un en-tête `Range` pour une ressource de taille connue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteRange {
    /// Pas de plage exploitable : corps complet
    Full,
    /// Octets `start..=end`
    Partial { start: u64, end: u64 },
    /// Plage hors de la ressource
    Unsatisfiable,
}

impl ByteRange {
    /// Analyse `header` pour une ressource de `size` octets.
    ///
    /// Les en-têtes mal formés ou à plages multiples donnent [`ByteRange::Full`].
    pub fn parse(header: &str, size: u64) -> Self {
        let Some(spec) = header.trim().strip_prefix("bytes=") else {
            return ByteRange::Full;
        };
        if spec.contains(',') {
            return ByteRange::Full;
        }
        let Some((first, last)) = spec.trim().split_once('-') else {
            return ByteRange::Full;
        };
        let (first, last) = (first.trim(), last.trim());

        match (first.is_empty(), last.is_empty()) {
            // bytes=-n : les n derniers octets
            (true, false) => match last.parse::<u64>() {
                Ok(0) => ByteRange::Unsatisfiable,
                Ok(_) if size == 0 => ByteRange::Unsatisfiable,
                Ok(n) => ByteRange::Partial {
                    start: size.saturating_sub(n),
                    end: size - 1,
                },
                Err(_) => ByteRange::Full,
            },
            // bytes=a-
            (false, true) => match first.parse::<u64>() {
                Ok(start) if start >= size => ByteRange::Unsatisfiable,
                Ok(start) => ByteRange::Partial {
                    start,
                    end: size - 1,
                },
                Err(_) => ByteRange::Full,
            },
            // bytes=a-b
            (false, false) => match (first.parse::<u64>(), last.parse::<u64>()) {
                (Ok(start), Ok(end)) if start > end => ByteRange::Full,
                (Ok(start), Ok(_)) if start >= size => ByteRange::Unsatisfiable,
                (Ok(start), Ok(end)) => ByteRange::Partial {
                    start,
                    end: end.min(size - 1),
                },
                _ => ByteRange::Full,
            },
            (true, true) => ByteRange::Full,
        }
    }

    /// Nombre d'octets couverts par une plage partielle.
    pub fn len(&self) -> Option<u64> {
        match self {
            ByteRange::Partial { start, end } => Some(end - start + 1),
            _ => None,
        }
    }
}
