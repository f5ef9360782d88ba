use super::{tables, Fallback, GlyphSet};

/// Cadeia de normalização, na ordem fixa:
/// 1. o glifo existe na fonte → mantém;
/// 2. substituição manual → troca;
/// 3. decomposição canônica → usa a letra base se a fonte a desenhar;
/// 4. reserva da variante (descarte ou '?').
pub fn normalize(text: &str, set: &GlyphSet) -> String {
    let mut out = String::with_capacity(text.len());

    for c in text.chars() {
        if set.supports(c) {
            out.push(c);
            continue;
        }

        if let Some(sub) = set.manual_sub(c) {
            out.push(sub);
            continue;
        }

        if let Some(base) = tables::base_letter(c) {
            if set.supports(base) {
                out.push(base);
                continue;
            }
        }

        match set.fallback() {
            Fallback::Drop => {}
            Fallback::Replace(r) => out.push(r),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::super::{VARIANT_A, VARIANT_B};
    use super::*;

    #[test]
    fn supported_text_passes_through() {
        let s = "Appuyez sur X pour continuer, héros!";
        assert_eq!(normalize(s, &VARIANT_A), s);
        assert_eq!(normalize(s, &VARIANT_B), s);
    }

    #[test]
    fn manual_map_wins_before_decomposition() {
        // o glifo pontuado tem decomposição, mas o mapa manual decide primeiro
        assert_eq!(normalize("Ṡim", &VARIANT_B), "Sim");
        // ligadura não decompõe; só o mapa manual resolve
        assert_eq!(normalize("Œuvre", &VARIANT_B), "œuvre");
        assert_eq!(normalize("Œuvre", &VARIANT_A), "œuvre");
    }

    #[test]
    fn decomposition_recovers_base_letters() {
        // ř não está em nenhum mapa manual; cai na decomposição
        assert_eq!(normalize("Dvořák", &VARIANT_B), "Dvorák");
    }

    #[test]
    fn terminal_fallback_differs_per_variant() {
        // Ł não decompõe e não tem substituição manual; ź decompõe para z
        assert_eq!(normalize("Łódź", &VARIANT_B), "?ódz");
        assert_eq!(normalize("Łódź", &VARIANT_A), "ódz");
    }

    #[test]
    fn normalize_is_idempotent() {
        let samples = [
            "Press %s to continue",
            "Dvořák — Łódź",
            "ȧ ċ ė ṅ ȯ ṡ ż",
            "日本語テキスト",
            "maçã, õnibus, ação",
        ];
        for s in &samples {
            for set in [&VARIANT_A, &VARIANT_B] {
                let once = normalize(s, set);
                let twice = normalize(&once, set);
                assert_eq!(once, twice, "normalize not idempotent for {s:?}");
            }
        }
    }

    #[test]
    fn unsupported_is_dropped_or_replaced() {
        assert_eq!(normalize("語", &VARIANT_A), "");
        assert_eq!(normalize("語", &VARIANT_B), "?");
    }
}
