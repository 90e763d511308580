//! The `tryout admin …` commands: package and question management.

use std::path::Path;

use anyhow::Result;
use clap::{Args, Subcommand};
use comfy_table::{Cell, Table};

use tryout_core::admin::{
    create_package, create_question, delete_package, delete_question, list_packages,
    list_questions, set_package_active, update_package, update_question, PackageForm,
    QuestionForm,
};
use tryout_core::model::{QuestionPackage, DEFAULT_DURATION_MINUTES};

use super::{format_price, format_time, App};

#[derive(Subcommand)]
pub enum AdminCommand {
    /// List all packages, active or not
    Packages,

    /// Create a package
    AddPackage(PackageArgs),

    /// Replace the fields of a package
    EditPackage {
        id: String,
        #[command(flatten)]
        form: PackageArgs,
    },

    /// Make a package visible on the dashboard
    Activate { id: String },

    /// Hide a package from the dashboard
    Deactivate { id: String },

    /// Delete a package and its questions
    DeletePackage { id: String },

    /// List the questions of a package
    Questions { package: String },

    /// Add a question to a package
    AddQuestion {
        package: String,
        #[command(flatten)]
        form: QuestionArgs,
    },

    /// Replace the fields of a question
    EditQuestion {
        id: String,
        #[command(flatten)]
        form: QuestionArgs,
    },

    /// Delete a question
    DeleteQuestion { id: String },
}

#[derive(Args)]
pub struct PackageArgs {
    #[arg(long)]
    title: String,
    #[arg(long, default_value = "")]
    description: String,
    /// Time budget in minutes
    #[arg(long, default_value_t = DEFAULT_DURATION_MINUTES)]
    duration: u32,
    /// Price in rupiah
    #[arg(long, default_value_t = 0)]
    price: u64,
    /// Open to everyone without payment
    #[arg(long)]
    free: bool,
    /// Create hidden from the dashboard
    #[arg(long)]
    inactive: bool,
}

impl From<PackageArgs> for PackageForm {
    fn from(args: PackageArgs) -> Self {
        PackageForm {
            title: args.title,
            description: args.description,
            duration_minutes: args.duration,
            price: args.price,
            requires_payment: !args.free,
            is_active: !args.inactive,
        }
    }
}

#[derive(Args)]
pub struct QuestionArgs {
    #[arg(long)]
    number: u32,
    #[arg(long)]
    text: String,
    #[arg(long = "a")]
    option_a: String,
    #[arg(long = "b")]
    option_b: String,
    #[arg(long = "c")]
    option_c: String,
    #[arg(long = "d")]
    option_d: String,
    #[arg(long = "e")]
    option_e: String,
    /// Correct option, A-E
    #[arg(long)]
    answer: String,
    #[arg(long, default_value = "")]
    explanation: String,
    #[arg(long)]
    main_category: Option<String>,
    #[arg(long)]
    sub_category: Option<String>,
}

impl From<QuestionArgs> for QuestionForm {
    fn from(args: QuestionArgs) -> Self {
        QuestionForm {
            question_number: args.number,
            question_text: args.text,
            option_a: args.option_a,
            option_b: args.option_b,
            option_c: args.option_c,
            option_d: args.option_d,
            option_e: args.option_e,
            correct_answer: args.answer,
            explanation: args.explanation,
            main_category: args.main_category,
            sub_category: args.sub_category,
        }
    }
}

pub async fn execute(config: Option<&Path>, command: AdminCommand) -> Result<()> {
    let app = App::load(config)?;
    let admin = app.admin()?;
    let store = app.store();

    match command {
        AdminCommand::Packages => {
            let packages = list_packages(store, admin).await?;
            if packages.is_empty() {
                println!("No packages yet.");
            } else {
                println!("{}", package_table(&packages));
            }
        }
        AdminCommand::AddPackage(args) => {
            let package = create_package(store, admin, &args.into()).await?;
            println!("Created package \"{}\" ({})", package.title, package.id);
        }
        AdminCommand::EditPackage { id, form } => {
            let package = update_package(store, admin, &id, &form.into()).await?;
            println!("Updated package \"{}\"", package.title);
        }
        AdminCommand::Activate { id } => {
            let package = set_package_active(store, admin, &id, true).await?;
            println!("Package \"{}\" is active.", package.title);
        }
        AdminCommand::Deactivate { id } => {
            let package = set_package_active(store, admin, &id, false).await?;
            println!("Package \"{}\" is hidden.", package.title);
        }
        AdminCommand::DeletePackage { id } => {
            delete_package(store, admin, &id).await?;
            println!("Deleted package {id}.");
        }
        AdminCommand::Questions { package } => {
            let questions = list_questions(store, admin, &package).await?;
            if questions.is_empty() {
                println!("Package {package} has no questions.");
                return Ok(());
            }
            let mut table = Table::new();
            table.set_header(vec!["#", "ID", "Question", "Answer", "Category"]);
            for q in &questions {
                let (main, sub) = q.category_pair();
                table.add_row(vec![
                    Cell::new(q.question_number),
                    Cell::new(&q.id),
                    Cell::new(truncate(&q.question_text, 60)),
                    Cell::new(q.correct_answer),
                    Cell::new(format!("{main} / {sub}")),
                ]);
            }
            println!("{table}");
        }
        AdminCommand::AddQuestion { package, form } => {
            let question = create_question(store, admin, &package, &form.into()).await?;
            println!(
                "Added question {} ({}) to {package}",
                question.question_number, question.id
            );
        }
        AdminCommand::EditQuestion { id, form } => {
            let question = update_question(store, admin, &id, &form.into()).await?;
            println!("Updated question {}", question.question_number);
        }
        AdminCommand::DeleteQuestion { id } => {
            delete_question(store, admin, &id).await?;
            println!("Deleted question {id}.");
        }
    }
    Ok(())
}

fn package_table(packages: &[QuestionPackage]) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        "ID", "Title", "Questions", "Duration", "Price", "Active", "Created",
    ]);
    for p in packages {
        table.add_row(vec![
            Cell::new(&p.id),
            Cell::new(&p.title),
            Cell::new(p.total_questions),
            Cell::new(format!("{} min", p.duration_minutes)),
            Cell::new(format_price(p.price)),
            Cell::new(if p.is_active { "yes" } else { "no" }),
            Cell::new(format_time(p.created_at)),
        ]);
    }
    table
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{cut}...")
}
