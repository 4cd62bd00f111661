//! Sugerencias "did you mean" para nombres mal escritos.

use strsim::jaro_winkler;

const MIN_SIMILARITY: f64 = 0.8;

/// Candidato más parecido a `name`, si supera el umbral de similitud.
pub fn closest<'a, I>(name: &str, candidates: I) -> Option<&'a str>
    where I: IntoIterator<Item = &'a str>
{
    candidates.into_iter()
              .map(|c| (c, jaro_winkler(name, c)))
              .filter(|(_, score)| *score >= MIN_SIMILARITY)
              .max_by(|a, b| a.1.total_cmp(&b.1))
              .map(|(c, _)| c)
}

/// Sufijo listo para concatenar a un mensaje de error (vacío si no hay match).
pub fn hint<'a, I>(name: &str, candidates: I) -> String
    where I: IntoIterator<Item = &'a str>
{
    match closest(name, candidates) {
        Some(c) => format!(" (did you mean '{c}'?)"),
        None => String::new(),
    }
}
