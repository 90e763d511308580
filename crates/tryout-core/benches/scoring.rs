use criterion::{black_box, criterion_group, criterion_main, Criterion};

use tryout_core::model::{AnswerChoice, Question, UserAnswer};
use tryout_core::scoring::compute_results;

const CATEGORIES: [(&str, &str); 4] = [
    ("TWK", "Pancasila"),
    ("TIU", "Aritmatika"),
    ("TIU", "Verbal"),
    ("TKP", "Pelayanan Publik"),
];

fn make_question(n: usize) -> Question {
    let (main, sub) = CATEGORIES[n % CATEGORIES.len()];
    Question {
        id: format!("q{n}"),
        package_id: "bench".into(),
        question_number: n as u32 + 1,
        question_text: format!("Question {n}"),
        option_a: "a".into(),
        option_b: "b".into(),
        option_c: "c".into(),
        option_d: "d".into(),
        option_e: "e".into(),
        correct_answer: AnswerChoice::ALL[n % 5],
        explanation: String::new(),
        main_category: Some(main.into()),
        sub_category: Some(sub.into()),
        created_at: None,
        updated_at: None,
    }
}

/// Answer every `stride`-th question, alternating right and wrong.
fn make_answers(questions: &[Question], stride: usize) -> Vec<UserAnswer> {
    questions
        .iter()
        .step_by(stride)
        .enumerate()
        .map(|(i, q)| {
            let choice = if i % 2 == 0 {
                q.correct_answer
            } else {
                AnswerChoice::ALL[(i + 1) % 5]
            };
            UserAnswer {
                id: format!("a{i}"),
                session_id: "s".into(),
                question_id: q.id.clone(),
                user_answer: Some(choice),
                is_correct: q.is_correct(choice),
                time_spent_seconds: (i % 90) as u64,
                created_at: None,
                updated_at: None,
            }
        })
        .collect()
}

fn bench_compute_results(c: &mut Criterion) {
    let mut group = c.benchmark_group("compute_results");

    for size in [10usize, 110, 500] {
        let questions: Vec<Question> = (0..size).map(make_question).collect();
        let answers = make_answers(&questions, 1);
        group.bench_function(format!("all_answered/{size}"), |b| {
            b.iter(|| compute_results(black_box(&questions), black_box(&answers)))
        });

        let sparse = make_answers(&questions, 3);
        group.bench_function(format!("third_answered/{size}"), |b| {
            b.iter(|| compute_results(black_box(&questions), black_box(&sparse)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_compute_results);
criterion_main!(benches);
