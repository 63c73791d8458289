use academy_core::Error;
use academy_core::model::{Course, CourseId, IdError, Lesson, LessonId, Module, ModuleId};

struct DemoCourse {
    slug: &'static str,
    title: &'static str,
    description: &'static str,
    category: &'static str,
    price_fcfa: i64,
    instructor_name: &'static str,
    duration: &'static str,
    level: &'static str,
    rating: f32,
    thumbnail_url: &'static str,
}

const DEMO_COURSES: [DemoCourse; 3] = [
    DemoCourse {
        slug: "lolly-premium",
        title: "LOLLY PREMIUM : Stratégie & Croissance",
        description: "Le programme complet pour transformer votre business.",
        category: "Business",
        price_fcfa: 125_000,
        instructor_name: "Jean-Marc Lolly",
        duration: "20h",
        level: "Expert",
        rating: 4.9,
        thumbnail_url: "https://images.unsplash.com/photo-1557804506-669a67965ba0?auto=format&fit=crop&q=80&w=1000",
    },
    DemoCourse {
        slug: "uiux-mastery",
        title: "UI/UX Design Mastery",
        description: "Créez des interfaces modernes et engageantes.",
        category: "Design",
        price_fcfa: 85_000,
        instructor_name: "Sarah Connors",
        duration: "15h",
        level: "Intermédiaire",
        rating: 4.8,
        thumbnail_url: "https://images.unsplash.com/photo-1581291518633-83b4ebd1d83e?auto=format&fit=crop&q=80&w=1000",
    },
    DemoCourse {
        slug: "ia-leaders",
        title: "Intelligence Artificielle pour Leaders",
        description: "Comprendre et intégrer l'IA dans votre entreprise.",
        category: "Tech",
        price_fcfa: 95_000,
        instructor_name: "Dr. Alan T.",
        duration: "12h",
        level: "Débutant",
        rating: 4.7,
        thumbnail_url: "https://images.unsplash.com/photo-1620712943543-bcc4688e7485?auto=format&fit=crop&q=80&w=1000",
    },
];

/// Demo catalog: three courses, each with one introductory module.
///
/// Lesson ids are `<slug>-l<n>`, so `complete lolly-premium-l1` works right
/// after seeding. Every course is checked before it is handed out.
pub fn demo_catalog() -> Result<Vec<Course>, Error> {
    DEMO_COURSES
        .iter()
        .map(|demo| {
            let course = demo_course(demo)?;
            course.validate()?;
            Ok(course)
        })
        .collect()
}

fn demo_course(demo: &DemoCourse) -> Result<Course, Error> {
    let course_id = CourseId::new(demo.slug)?;
    let module_id = ModuleId::new(format!("{}-m1", demo.slug))?;
    let lessons = [
        ("Leçon 01 : Les Bases", "Introduction au cours."),
        ("Leçon 02 : Mise en pratique", "Premiers exercices guidés."),
    ]
    .into_iter()
    .zip(1..)
    .map(|((title, content), position)| -> Result<Lesson, IdError> {
        Ok(Lesson {
            id: LessonId::new(format!("{}-l{position}", demo.slug))?,
            module_id: module_id.clone(),
            title: title.to_owned(),
            duration: "10".to_owned(),
            video_url: Some(format!("/videos/Timeline {position}.mp4")),
            content: Some(content.to_owned()),
            position,
        })
    })
    .collect::<Result<Vec<_>, _>>()?;

    Ok(Course {
        id: course_id.clone(),
        title: demo.title.to_owned(),
        description: demo.description.to_owned(),
        category: demo.category.to_owned(),
        price_fcfa: demo.price_fcfa,
        rating: demo.rating,
        instructor_name: demo.instructor_name.to_owned(),
        duration: demo.duration.to_owned(),
        level: demo.level.to_owned(),
        thumbnail_url: Some(demo.thumbnail_url.to_owned()),
        modules: vec![Module {
            id: module_id,
            course_id,
            title: "Module 1 : Introduction".to_owned(),
            position: 1,
            lessons,
        }],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_catalog_is_valid() {
        let courses = demo_catalog().unwrap();
        assert_eq!(courses.len(), 3);
        for course in &courses {
            course.validate().unwrap();
            assert_eq!(course.lesson_count(), 2);
        }
        assert_eq!(courses[0].lesson_ids()[0].as_str(), "lolly-premium-l1");
    }

    #[test]
    fn blank_slug_surfaces_as_id_error() {
        let demo = DemoCourse {
            slug: "",
            ..DEMO_COURSES[0]
        };
        assert!(matches!(demo_course(&demo), Err(Error::Id(_))));
    }
}
