// Kept in sync with `migrations/schema.sql`.

diesel::table! {
    categories (id) {
        id -> Integer,
        name -> Text,
        color -> Nullable<Text>,
        created_at -> Timestamp,
    }
}

diesel::table! {
    tasks (id) {
        id -> Integer,
        title -> Text,
        description -> Nullable<Text>,
        due_date -> Nullable<Timestamp>,
        completed -> Bool,
        priority -> Text,
        category_id -> Nullable<Integer>,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::joinable!(tasks -> categories (category_id));

diesel::allow_tables_to_appear_in_same_query!(categories, tasks,);
