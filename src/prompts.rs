//! Prompt templates for intent classification and narration.
//!
//! The schema context describes the MySQL database the sales platform runs
//! on; it is sent with every classification request so the model grounds its
//! SQL in real tables and relations.

/// Schéma de la base de données pour le contexte.
pub const DB_SCHEMA: &str = r#"Tables disponibles dans la base de données:

1. categories (id, nom, description, image)
2. produits (id, nom, description, prix, categorie_id, image)
3. vendeurs (id, nom, email, telephone, est_approuve) - hérite de utilisateurs
4. clients (id, nom, email, telephone, adresse_livraison) - hérite de utilisateurs
5. vendeur_produits (id, vendeur_id, produit_id, prix_vendeur, titre, description, image, est_approuve)
6. commandes (id, client_id, date_commande, statut, total, adresse_livraison)
7. lignes_commande (id, commande_id, vendeur_produit_id, quantite, prix_unitaire, sous_total)
8. avis (id, client_id, vendeur_produit_id, note, commentaire, date_avis)

Relations:
- produits.categorie_id -> categories.id
- vendeur_produits.vendeur_id -> vendeurs.id
- vendeur_produits.produit_id -> produits.id
- commandes.client_id -> clients.id
- lignes_commande.commande_id -> commandes.id
- lignes_commande.vendeur_produit_id -> vendeur_produits.id
- avis.vendeur_produit_id -> vendeur_produits.id"#;

/// System prompt for the intent classifier.
///
/// The model must answer with exactly one JSON object; the classifier
/// tolerates an optional Markdown fence around it and nothing else.
pub fn build_classification_prompt(schema: &str) -> String {
    format!(
        r#"Tu es un assistant d'analyse de données expert. Tu dois analyser la demande de l'utilisateur et déterminer:

1. Si l'utilisateur veut un KPI (une valeur simple comme un total, une moyenne, un nombre) ou un graphique
2. Si c'est un graphique, quel type: "bar" (barres), "line" (lignes), "pie" (camembert), "donut" (anneau)
3. La requête SQL à exécuter pour obtenir les données

{schema}

IMPORTANT:
- Pour les KPIs, retourne une seule valeur ou quelques valeurs clés
- Pour les graphiques, retourne des données avec des labels et des valeurs
- Utilise toujours des alias clairs pour les colonnes (label, value, etc.)
- Les montants sont en DH (Dirhams)

Réponds UNIQUEMENT avec un JSON valide au format suivant:
{{
    "type": "kpi" ou "chart",
    "chart_type": "bar" | "line" | "pie" | "donut" | null,
    "title": "Titre descriptif",
    "description": "Description courte de ce que montre l'analyse",
    "sql_query": "SELECT ..."
}}

Exemples de requêtes:
- "combien de commandes" -> KPI avec COUNT
- "chiffre d'affaires total" -> KPI avec SUM
- "ventes par catégorie" -> graphique pie ou bar
- "évolution des ventes par mois" -> graphique line
- "top 5 produits" -> graphique bar
- "répartition des vendeurs" -> graphique donut"#
    )
}

/// System prompt for the narrator.
pub const NARRATION_SYSTEM_PROMPT: &str = "Tu es un assistant d'analyse de données. \
Génère une réponse courte et naturelle en français basée sur les résultats de l'analyse. \
Sois concis mais informatif. Utilise des chiffres formattés (ex: 1,234.56 DH).";
