use rand::seq::SliceRandom;

use crate::models::Mood;

pub trait LoadingCopyProvider: Send + Sync {
    fn pick_message(&self, mood: Mood) -> String;
}

const GENERIC: &[&str] = &[
    "Menyiapkan ayat untukmu...",
    "Menenangkan hati sejenak...",
    "Mencari sapaan yang tepat...",
];

/// Built-in status copy, drawn uniformly at random per mood. Repeats are fine.
#[derive(Debug, Default, Clone, Copy)]
pub struct StaticLoadingCopy;

impl StaticLoadingCopy {
    fn messages(mood: Mood) -> &'static [&'static str] {
        match mood {
            Mood::Happy => &[
                "Merangkai syukur atas kebahagiaanmu...",
                "Mencari ayat tentang nikmat-Nya...",
            ],
            Mood::Sad => &[
                "Allah dekat dengan hati yang terluka...",
                "Mencari penghiburan dari Al-Quran...",
                "Tarik napas perlahan, kita cari bersama...",
            ],
            Mood::Anxious => &[
                "Hanya dengan mengingat Allah hati menjadi tenang...",
                "Menenangkan pikiran yang gelisah...",
            ],
            Mood::Angry => &[
                "Menahan amarah adalah kekuatan...",
                "Mendinginkan hati sejenak...",
            ],
            Mood::Lonely => &[
                "Kamu tidak pernah benar-benar sendiri...",
                "Mencari teman dalam kalam-Nya...",
            ],
            Mood::Grateful => &[
                "Syukur membuka pintu nikmat...",
                "Mengumpulkan ayat tentang syukur...",
            ],
            Mood::Tired => &[
                "Beristirahatlah sejenak...",
                "Setelah kesulitan ada kemudahan...",
            ],
            Mood::Confused => &[
                "Memohon petunjuk jalan yang lurus...",
                "Menjernihkan pikiran sejenak...",
            ],
        }
    }
}

impl LoadingCopyProvider for StaticLoadingCopy {
    fn pick_message(&self, mood: Mood) -> String {
        let mut rng = rand::thread_rng();
        Self::messages(mood)
            .choose(&mut rng)
            .or_else(|| GENERIC.choose(&mut rng))
            .map(|message| message.to_string())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_from_the_mood_table() {
        let copy = StaticLoadingCopy;
        for mood in Mood::ALL {
            let message = copy.pick_message(mood);
            assert!(StaticLoadingCopy::messages(mood).contains(&message.as_str()));
        }
    }
}
