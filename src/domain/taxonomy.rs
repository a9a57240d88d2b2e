//! Keyword-scored category taxonomy.
//!
//! A static two-level tree: each category carries a keyword list, and its
//! subcategories carry their own. Classification counts whole-word keyword
//! occurrences over the product's combined text; a category that scores
//! positively also has its subcategories scored. No match at all maps to
//! the sentinel `others` category.

use crate::domain::product::{CategoryAssignment, ProductRecord, OTHERS_CATEGORY};

struct SubcategoryDef {
    slug: &'static str,
    keywords: &'static [&'static str],
}

struct CategoryDef {
    slug: &'static str,
    keywords: &'static [&'static str],
    subcategories: &'static [SubcategoryDef],
}

static TAXONOMY: &[CategoryDef] = &[
    CategoryDef {
        slug: "computadoras",
        keywords: &["laptop", "notebook", "desktop", "pc", "computadora", "chromebook", "macbook"],
        subcategories: &[
            SubcategoryDef { slug: "laptops", keywords: &["laptop", "notebook", "ultrabook", "macbook"] },
            SubcategoryDef { slug: "desktops", keywords: &["desktop", "torre", "all-in-one", "aio"] },
        ],
    },
    CategoryDef {
        slug: "componentes",
        keywords: &["procesador", "cpu", "ram", "ssd", "hdd", "mainboard", "placa", "fuente", "gpu", "tarjeta"],
        subcategories: &[
            SubcategoryDef { slug: "almacenamiento", keywords: &["ssd", "hdd", "nvme", "disco"] },
            SubcategoryDef { slug: "memorias", keywords: &["ram", "dimm", "sodimm", "ddr4", "ddr5"] },
            SubcategoryDef { slug: "tarjetas-video", keywords: &["gpu", "geforce", "radeon", "rtx", "gtx"] },
        ],
    },
    CategoryDef {
        slug: "perifericos",
        keywords: &["teclado", "mouse", "monitor", "audifonos", "webcam", "parlante", "microfono", "mousepad"],
        subcategories: &[
            SubcategoryDef { slug: "teclados", keywords: &["teclado", "mecanico", "membrana"] },
            SubcategoryDef { slug: "monitores", keywords: &["monitor", "pulgadas", "curvo"] },
            SubcategoryDef { slug: "audio", keywords: &["audifonos", "parlante", "headset", "microfono"] },
        ],
    },
    CategoryDef {
        slug: "impresion",
        keywords: &["impresora", "tinta", "toner", "multifuncional", "escaner", "plotter"],
        subcategories: &[
            SubcategoryDef { slug: "impresoras", keywords: &["impresora", "multifuncional", "plotter"] },
            SubcategoryDef { slug: "consumibles", keywords: &["tinta", "toner", "cartucho"] },
        ],
    },
    CategoryDef {
        slug: "redes",
        keywords: &["router", "switch", "modem", "antena", "repetidor", "mesh", "ethernet"],
        subcategories: &[
            SubcategoryDef { slug: "routers", keywords: &["router", "mesh"] },
            SubcategoryDef { slug: "cableado", keywords: &["ethernet", "utp", "patch"] },
        ],
    },
    CategoryDef {
        slug: "gaming",
        keywords: &["gamer", "gaming", "consola", "playstation", "xbox", "nintendo", "joystick"],
        subcategories: &[
            SubcategoryDef { slug: "consolas", keywords: &["consola", "playstation", "xbox", "nintendo"] },
            SubcategoryDef { slug: "accesorios-gamer", keywords: &["joystick", "gamepad", "control"] },
        ],
    },
    CategoryDef {
        slug: "celulares",
        keywords: &["celular", "smartphone", "tablet", "smartwatch", "iphone", "android"],
        subcategories: &[
            SubcategoryDef { slug: "smartphones", keywords: &["celular", "smartphone", "iphone"] },
            SubcategoryDef { slug: "wearables", keywords: &["smartwatch", "band", "pulsera"] },
        ],
    },
    CategoryDef {
        slug: "electrohogar",
        keywords: &["televisor", "refrigeradora", "lavadora", "microondas", "licuadora", "aspiradora"],
        subcategories: &[
            SubcategoryDef { slug: "televisores", keywords: &["televisor", "smart tv", "oled", "qled"] },
            SubcategoryDef { slug: "linea-blanca", keywords: &["refrigeradora", "lavadora", "cocina"] },
        ],
    },
];

/// Count non-overlapping whole-word occurrences of `word` in `text`.
/// Word boundaries are non-alphanumeric characters.
fn whole_word_count(text: &str, word: &str) -> u32 {
    if word.is_empty() {
        return 0;
    }
    let mut count = 0;
    let mut start = 0;
    while let Some(pos) = text[start..].find(word) {
        let abs = start + pos;
        let end = abs + word.len();
        let before_ok = abs == 0
            || !text[..abs]
                .chars()
                .next_back()
                .is_some_and(char::is_alphanumeric);
        let after_ok = end >= text.len()
            || !text[end..].chars().next().is_some_and(char::is_alphanumeric);
        if before_ok && after_ok {
            count += 1;
        }
        start = end.max(abs + 1);
    }
    count
}

fn keyword_score(text: &str, keywords: &[&str]) -> u32 {
    keywords.iter().map(|kw| whole_word_count(text, kw)).sum()
}

/// Assigns zero or more taxonomy categories to a product.
pub struct CategoryClassifier;

impl CategoryClassifier {
    /// Lowercased classification input: name, description, brand and the
    /// JSON rendering of the specifications.
    pub fn classification_text(record: &ProductRecord) -> String {
        let specs_json =
            serde_json::to_string(&record.specifications).unwrap_or_default();
        format!(
            "{} {} {} {}",
            record.name,
            record.description,
            record.brand.as_deref().unwrap_or(""),
            specs_json
        )
        .to_lowercase()
    }

    /// Score the taxonomy against already-lowercased text. Matches come
    /// back sorted by descending score; ties keep discovery order.
    pub fn classify_text(text: &str) -> Vec<CategoryAssignment> {
        let mut matches = Vec::new();
        for category in TAXONOMY {
            let score = keyword_score(text, category.keywords);
            if score == 0 {
                continue;
            }
            matches.push(CategoryAssignment {
                slug: category.slug.to_string(),
                score,
            });
            for sub in category.subcategories {
                let sub_score = keyword_score(text, sub.keywords);
                if sub_score > 0 {
                    matches.push(CategoryAssignment {
                        slug: sub.slug.to_string(),
                        score: sub_score,
                    });
                }
            }
        }
        if matches.is_empty() {
            return vec![CategoryAssignment {
                slug: OTHERS_CATEGORY.to_string(),
                score: 0,
            }];
        }
        // Stable sort keeps discovery order for equal scores.
        matches.sort_by(|a, b| b.score.cmp(&a.score));
        matches
    }

    pub fn classify(record: &ProductRecord) -> Vec<CategoryAssignment> {
        Self::classify_text(&Self::classification_text(record))
    }
}
